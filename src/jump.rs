//! Jump estimator: the level shift at an event from a before/after dummy
//! regression inside a symmetric event-time window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EventStudyError, Result};
use crate::event_time::event_time;
use crate::ols::{Design, RobustFit};
use crate::panel::Panel;
use crate::table::EffectRow;

/// Fewest complete rows a design may have before estimators give up.
pub const MIN_OBSERVATIONS: usize = 8;

/// Name of the post-event indicator term.
pub const POST: &str = "post";

/// Point estimate, standard error and sample size of a jump.
///
/// `estimate` and `se` are NaN when the design is degenerate; `n` still
/// reports how many complete rows were available.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JumpEstimate {
    pub estimate: f64,
    pub se: f64,
    pub n: usize,
}

impl JumpEstimate {
    /// Degenerate-design sentinel.
    pub fn undefined(n: usize) -> Self {
        Self {
            estimate: f64::NAN,
            se: f64::NAN,
            n,
        }
    }

    /// True when both the estimate and its standard error are finite.
    pub fn is_defined(&self) -> bool {
        self.estimate.is_finite() && self.se.is_finite()
    }

    /// Renders the estimate as a `post` row with a 95% normal interval.
    pub fn to_row(&self) -> EffectRow {
        EffectRow::new(POST, self.estimate, self.se, self.n)
    }
}

/// Estimates the jump in `outcome` at `event_date`.
///
/// Rows with event time in `[-window, window]` enter a regression of the
/// outcome on an intercept, a post indicator (event time >= 0) and the
/// controls present in the panel. Standard errors are Newey-West at
/// `hac_lags`. Fewer than [`MIN_OBSERVATIONS`] complete rows, a post
/// indicator without variation, or a post term lost to collinearity yield
/// [`JumpEstimate::undefined`].
///
/// # Errors
///
/// [`EventStudyError::MissingColumn`] if `outcome` is not in the panel.
pub fn estimate_jump(
    panel: &Panel,
    outcome: &str,
    event_date: NaiveDate,
    window: usize,
    controls: &[&str],
    hac_lags: usize,
) -> Result<JumpEstimate> {
    let y = panel.require_numeric(outcome)?;
    let offsets = event_time(panel, event_date);
    let rows = window_rows(&offsets, window);

    let mut design = Design::new(pick(&y, &rows));
    design.push(POST, rows.iter().map(|&r| post_indicator(offsets[r])).collect())?;
    for name in usable_controls(panel, outcome, controls) {
        design.push(name, pick(&panel.require_numeric(name)?, &rows))?;
    }
    let dropped = design.drop_all_missing();
    if !dropped.is_empty() {
        log::debug!("jump design drops all-missing columns {dropped:?}");
    }

    let design = design.complete_cases();
    let n = design.nobs();
    if n < MIN_OBSERVATIONS || !design.varies(POST) {
        log::debug!("jump at {event_date} for `{outcome}` is degenerate (n = {n})");
        return Ok(JumpEstimate::undefined(n));
    }

    let Some(fit) = fit_or_degenerate(&design, hac_lags)? else {
        return Ok(JumpEstimate::undefined(n));
    };
    Ok(match (fit.estimate(POST), fit.std_error(POST)) {
        (Some(estimate), Some(se)) => JumpEstimate {
            estimate,
            se,
            n: fit.nobs(),
        },
        _ => JumpEstimate::undefined(fit.nobs()),
    })
}

/// Fits a design, mapping a numerically singular system to `None`.
pub(crate) fn fit_or_degenerate(design: &Design, hac_lags: usize) -> Result<Option<RobustFit>> {
    match design.fit(hac_lags) {
        Ok(fit) => Ok(Some(fit)),
        Err(EventStudyError::SingularMatrix { context }) => {
            log::debug!("singular {context}; treating design as degenerate");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Positions of rows whose event time lies in `[-window, window]`.
pub(crate) fn window_rows(offsets: &[Option<i64>], window: usize) -> Vec<usize> {
    let window = window as i64;
    offsets
        .iter()
        .enumerate()
        .filter_map(|(row, offset)| match offset {
            Some(t) if (-window..=window).contains(t) => Some(row),
            _ => None,
        })
        .collect()
}

pub(crate) fn post_indicator(offset: Option<i64>) -> f64 {
    match offset {
        Some(t) if t >= 0 => 1.0,
        _ => 0.0,
    }
}

/// Controls that exist in the panel, without the outcome and without repeats.
pub(crate) fn usable_controls<'a>(panel: &Panel, outcome: &str, controls: &[&'a str]) -> Vec<&'a str> {
    let mut usable: Vec<&str> = Vec::with_capacity(controls.len());
    for &name in controls {
        if name != outcome && panel.has_column(name) && !usable.contains(&name) {
            usable.push(name);
        }
    }
    usable
}

pub(crate) fn pick(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&r| values[r]).collect()
}
