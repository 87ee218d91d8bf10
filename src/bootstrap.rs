//! Moving-block bootstrap standard errors for the jump estimator.

use chrono::NaiveDate;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{EventStudyError, Result};
use crate::event_time::event_time;
use crate::jump::{estimate_jump, window_rows};
use crate::panel::Panel;

/// Fewest windowed rows needed before resampling is attempted.
pub const MIN_BOOTSTRAP_ROWS: usize = 10;

/// HAC lag used for the jump fits inside each replication.
const REPLICATION_HAC_LAGS: usize = 1;

/// Controls the block bootstrap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BootstrapOptions {
    /// Number of bootstrap replications.
    pub reps: usize,
    /// Length of each contiguous block, in rows.
    pub block_size: usize,
    /// Seed for the pseudo-random generator; the same seed reproduces the
    /// same block starts for the same input.
    pub seed: u64,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            reps: 200,
            block_size: 5,
            seed: 42,
        }
    }
}

impl BootstrapOptions {
    /// Set the number of replications.
    pub fn with_reps(mut self, reps: usize) -> Self {
        self.reps = reps;
        self
    }

    /// Set the block length in rows.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Block-bootstrap standard error of the jump at `event_date`.
///
/// The panel is restricted to the event window, contiguous blocks of rows are
/// drawn with replacement and the jump estimator is refit on every resample
/// (with one HAC lag). Returns the sample standard deviation of the finite
/// replication estimates, or NaN when the window has fewer than
/// [`MIN_BOOTSTRAP_ROWS`] rows or fewer than two replications succeed.
///
/// # Errors
///
/// [`EventStudyError::MissingColumn`] if `outcome` is not in the panel.
pub fn bootstrap_se(
    panel: &Panel,
    outcome: &str,
    event_date: NaiveDate,
    window: usize,
    controls: &[&str],
    options: &BootstrapOptions,
) -> Result<f64> {
    if !panel.has_column(outcome) {
        return Err(EventStudyError::missing_column(outcome));
    }
    let offsets = event_time(panel, event_date);
    let windowed = panel.take(&window_rows(&offsets, window));
    let n = windowed.len();
    if n < MIN_BOOTSTRAP_ROWS {
        log::debug!("bootstrap window for `{outcome}` has {n} rows; skipping");
        return Ok(f64::NAN);
    }

    let mut rng = SmallRng::seed_from_u64(options.seed);
    let mut estimates = Vec::with_capacity(options.reps);
    for _ in 0..options.reps {
        let positions = resample_positions(&mut rng, n, options.block_size);
        let sample = windowed.take(&positions);
        let jump = estimate_jump(
            &sample,
            outcome,
            event_date,
            window,
            controls,
            REPLICATION_HAC_LAGS,
        )?;
        if jump.estimate.is_finite() {
            estimates.push(jump.estimate);
        }
    }

    log::debug!(
        "bootstrap for `{outcome}`: {} of {} replications usable",
        estimates.len(),
        options.reps
    );
    Ok(sample_std(&estimates))
}

/// Row positions of one moving-block resample of `n` rows.
///
/// Draws `max(n / block_size, 1)` block starts uniformly from
/// `0..=n - block_size` (or just `0` when `n < block_size`); blocks are
/// truncated at the end of the sample.
pub(crate) fn resample_positions<R: Rng>(rng: &mut R, n: usize, block_size: usize) -> Vec<usize> {
    let block = block_size.max(1);
    let draws = (n / block).max(1);
    let last_start = n.saturating_sub(block);
    let mut positions = Vec::with_capacity(draws * block);
    for _ in 0..draws {
        let start = rng.gen_range(0..=last_start);
        positions.extend(start..(start + block).min(n));
    }
    positions
}

/// Sample standard deviation with an `n - 1` denominator; NaN below two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = values.len() as f64;
    let mean = values.iter().sum::<f64>() / m;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (m - 1.0)).sqrt()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn resample_respects_bounds_and_block_count() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..50 {
            let positions = resample_positions(&mut rng, 23, 4);
            assert_eq!(positions.len(), 5 * 4);
            assert!(positions.iter().all(|&p| p < 23));
            for block in positions.chunks(4) {
                assert!(block.windows(2).all(|w| w[1] == w[0] + 1));
            }
        }
    }

    #[test]
    fn short_sample_uses_single_truncated_block() {
        let mut rng = SmallRng::seed_from_u64(9);
        assert_eq!(resample_positions(&mut rng, 3, 5), vec![0, 1, 2]);
    }

    #[test]
    fn same_seed_same_blocks() {
        let mut a = SmallRng::seed_from_u64(11);
        let mut b = SmallRng::seed_from_u64(11);
        assert_eq!(resample_positions(&mut a, 40, 5), resample_positions(&mut b, 40, 5));
    }

    #[test]
    fn sample_std_uses_bessel_correction() {
        assert_relative_eq!(sample_std(&[1.0, 2.0, 3.0, 4.0]), (5.0f64 / 3.0).sqrt());
        assert!(sample_std(&[1.0]).is_nan());
    }
}
