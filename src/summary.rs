//! Batch driver: runs the estimators over every series, event and window.
//!
//! A degenerate series never aborts the batch. It shows up as NaN rows or an
//! empty table and a warning in the log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::binned::binned_regression;
use crate::bootstrap::bootstrap_se;
use crate::error::Result;
use crate::frequency::Frequency;
use crate::jump::estimate_jump;
use crate::options::StudyConfig;
use crate::outcomes::{SeriesKey, ENTITY_COLUMN, TREASURY_COLUMN, VALUE_COLUMN};
use crate::panel::Panel;
use crate::pooled::{pooled_binned, pooled_jump};
use crate::table::{EffectTable, Z_95};

/// Inference behind a [`JumpResult`] standard error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpSpec {
    /// Newey-West standard error.
    Hac,
    /// Block-bootstrap standard error around the same point estimate.
    BlockBootstrap,
}

/// One jump estimate for a series, event and window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JumpResult {
    pub event_date: NaiveDate,
    pub strategy: String,
    pub series: String,
    pub tenor: Option<f64>,
    pub window: usize,
    pub spec: JumpSpec,
    pub estimate: f64,
    pub se: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub n: usize,
}

impl JumpResult {
    #[allow(clippy::too_many_arguments)]
    fn new(
        key: &SeriesKey,
        event_date: NaiveDate,
        window: usize,
        spec: JumpSpec,
        estimate: f64,
        se: f64,
        n: usize,
    ) -> Self {
        Self {
            event_date,
            strategy: key.strategy.clone(),
            series: key.series.clone(),
            tenor: key.tenor,
            window,
            spec,
            estimate,
            se,
            ci_low: estimate - Z_95 * se,
            ci_high: estimate + Z_95 * se,
            n,
        }
    }
}

/// Per-series event-path table for one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventPathResult {
    pub key: SeriesKey,
    pub event_date: NaiveDate,
    pub table: EffectTable,
}

/// Pooled table for one event (and window, for jumps).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PooledResult {
    pub event_date: NaiveDate,
    pub window: Option<usize>,
    pub table: EffectTable,
}

/// HAC and block-bootstrap jumps for every series x event x window.
pub fn run_jump_summary(
    panels: &[(SeriesKey, Panel)],
    config: &StudyConfig,
) -> Result<Vec<JumpResult>> {
    config.validate()?;
    let controls = config.control_names();
    let mut results = Vec::new();

    for (key, panel) in panels {
        log::debug!("{key}: {} rows, {} sampling", panel.len(), Frequency::infer(panel.dates()));
        for &event_date in &config.event_dates {
            for &window in &config.windows {
                let jump = estimate_jump(
                    panel,
                    VALUE_COLUMN,
                    event_date,
                    window,
                    &controls,
                    config.hac_lags,
                )?;
                if !jump.is_defined() {
                    log::warn!(
                        "{key}: jump at {event_date} (window {window}) undefined with n = {}",
                        jump.n
                    );
                }
                let boot = bootstrap_se(
                    panel,
                    VALUE_COLUMN,
                    event_date,
                    window,
                    &controls,
                    &config.bootstrap,
                )?;
                results.push(JumpResult::new(
                    key,
                    event_date,
                    window,
                    JumpSpec::Hac,
                    jump.estimate,
                    jump.se,
                    jump.n,
                ));
                results.push(JumpResult::new(
                    key,
                    event_date,
                    window,
                    JumpSpec::BlockBootstrap,
                    jump.estimate,
                    boot,
                    jump.n,
                ));
            }
        }
    }
    log::info!("jump summary: {} rows across {} series", results.len(), panels.len());
    Ok(results)
}

/// Binned event paths for every series x event.
pub fn run_event_paths(
    panels: &[(SeriesKey, Panel)],
    config: &StudyConfig,
) -> Result<Vec<EventPathResult>> {
    config.validate()?;
    let controls = config.control_names();
    let mut results = Vec::new();

    for (key, panel) in panels {
        for &event_date in &config.event_dates {
            let table = binned_regression(
                panel,
                VALUE_COLUMN,
                event_date,
                &config.event_bins,
                &controls,
                config.hac_lags,
            )?;
            if table.is_empty() {
                log::warn!("{key}: no usable event-path design at {event_date}");
            }
            results.push(EventPathResult {
                key: key.clone(),
                event_date,
                table,
            });
        }
    }
    Ok(results)
}

/// Pooled jumps and pooled event paths on a stacked panel, with
/// `treasury_based` as the treatment group and `entity` fixed effects.
pub fn run_pooled(pooled: &Panel, config: &StudyConfig) -> Result<Vec<PooledResult>> {
    config.validate()?;
    let controls = config.control_names();
    let mut results = Vec::new();

    for &event_date in &config.event_dates {
        for &window in &config.windows {
            let table = pooled_jump(
                pooled,
                VALUE_COLUMN,
                event_date,
                window,
                TREASURY_COLUMN,
                ENTITY_COLUMN,
                &controls,
                config.hac_lags,
            )?;
            if table.is_empty() {
                log::warn!("pooled jump at {event_date} (window {window}) is degenerate");
            }
            results.push(PooledResult {
                event_date,
                window: Some(window),
                table,
            });
        }

        let (table, _) = pooled_binned(
            pooled,
            VALUE_COLUMN,
            event_date,
            &config.event_bins,
            TREASURY_COLUMN,
            ENTITY_COLUMN,
            &controls,
            config.hac_lags,
            None,
        )?;
        if table.is_empty() {
            log::warn!("pooled event path at {event_date} is degenerate");
        }
        results.push(PooledResult {
            event_date,
            window: None,
            table,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::BootstrapOptions;
    use crate::event_time::EventBin;
    use crate::outcomes::{pooled_panel, series_panels, OutcomeRecord};

    fn event() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 2, 15).unwrap()
    }

    fn records() -> Vec<OutcomeRecord> {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let mut out = Vec::new();
        for (series, treasury, jump) in [("arb_5", true, 3.0), ("CIP_EUR", false, 1.0)] {
            for i in 0..90u64 {
                let date = start.checked_add_days(chrono::Days::new(i)).unwrap();
                let wiggle = ((i * 7 % 11) as f64 - 5.0) * 0.05;
                let post = if date >= event() { jump } else { 0.0 };
                out.push(OutcomeRecord {
                    date: Some(date),
                    strategy: if treasury { "TIPS_Treasury" } else { "CIP" }.to_string(),
                    series: series.to_string(),
                    tenor: Some(5.0),
                    value: 10.0 + post + wiggle,
                    treasury_based: treasury,
                });
            }
        }
        out
    }

    fn config() -> StudyConfig {
        StudyConfig::default()
            .with_event_dates(vec![event()])
            .with_windows(vec![10, 20])
            .with_event_bins(vec![
                EventBin::new(-20, -1),
                EventBin::new(0, 0),
                EventBin::new(1, 20),
            ])
            .with_controls(Vec::new())
            .with_hac_lags(2)
            .with_bootstrap(BootstrapOptions::default().with_reps(10))
    }

    #[test]
    fn jump_summary_emits_hac_and_bootstrap_rows() {
        let config = config();
        let panels = series_panels(&records(), &config).unwrap();
        let rows = run_jump_summary(&panels, &config).unwrap();
        // 2 series x 1 event x 2 windows x 2 specs
        assert_eq!(rows.len(), 8);
        for pair in rows.chunks(2) {
            assert_eq!(pair[0].spec, JumpSpec::Hac);
            assert_eq!(pair[1].spec, JumpSpec::BlockBootstrap);
            assert_eq!(pair[0].estimate, pair[1].estimate);
            assert_eq!(pair[0].n, pair[1].n);
        }
        let treasury = rows
            .iter()
            .find(|r| r.series == "arb_5" && r.window == 20 && r.spec == JumpSpec::Hac)
            .unwrap();
        assert!((treasury.estimate - 3.0).abs() < 0.5);
        assert_eq!(treasury.ci_high, treasury.estimate + Z_95 * treasury.se);
    }

    #[test]
    fn event_paths_cover_every_series_and_event() {
        let config = config();
        let panels = series_panels(&records(), &config).unwrap();
        let paths = run_event_paths(&panels, &config).unwrap();
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert_eq!(path.event_date, event());
            assert!(path.table.find("[0,0]").is_some());
            assert!(path.table.find("[-20,-1]").is_none());
        }
    }

    #[test]
    fn pooled_batch_has_jump_and_path_tables() {
        let config = config();
        let pooled = pooled_panel(&records(), &config).unwrap();
        let results = run_pooled(&pooled, &config).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].window, Some(10));
        assert_eq!(results[2].window, None);
        assert!(!results[2].table.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = config().with_windows(Vec::new());
        assert!(run_jump_summary(&[], &config).is_err());
    }
}
