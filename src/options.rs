//! Study configuration: which events, windows and bins to estimate, and how.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::bootstrap::BootstrapOptions;
use crate::error::{EventStudyError, Result};
use crate::event_time::{validate_bins, EventBin};

/// Aggregated settings for a batch of event-study estimations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Regulatory event dates to study.
    pub event_dates: Vec<NaiveDate>,
    /// Symmetric jump windows, in event-time units.
    pub windows: Vec<usize>,
    /// Event-time bins for event-path regressions.
    pub event_bins: Vec<EventBin>,
    /// Restrict the batch to these series names, if set.
    pub dependent_series: Option<Vec<String>>,
    /// Restrict the batch to these tenors (years), if set.
    pub tenor_subset: Option<Vec<f64>>,
    /// Control columns added to every regression when present.
    pub direct_controls: Vec<String>,
    /// Newey-West lag order.
    pub hac_lags: usize,
    /// Block bootstrap settings for jump standard errors.
    pub bootstrap: BootstrapOptions,
}

impl Default for StudyConfig {
    fn default() -> Self {
        let dates = [(2020, 4, 1), (2021, 3, 19), (2021, 3, 31)];
        Self {
            event_dates: dates
                .iter()
                .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
                .collect(),
            windows: vec![3, 5, 10],
            event_bins: vec![
                EventBin::new(-60, -41),
                EventBin::new(-40, -21),
                EventBin::new(-20, -1),
                EventBin::new(0, 0),
                EventBin::new(1, 20),
                EventBin::new(21, 40),
                EventBin::new(41, 60),
            ],
            dependent_series: None,
            tenor_subset: None,
            direct_controls: vec!["sofr".into(), "tgcr".into(), "bgcr".into()],
            hac_lags: 5,
            bootstrap: BootstrapOptions::default(),
        }
    }
}

impl StudyConfig {
    /// Replace the event dates to study.
    pub fn with_event_dates(mut self, event_dates: Vec<NaiveDate>) -> Self {
        self.event_dates = event_dates;
        self
    }

    /// Replace the jump windows.
    pub fn with_windows(mut self, windows: Vec<usize>) -> Self {
        self.windows = windows;
        self
    }

    /// Replace the event-time bins used for event paths.
    pub fn with_event_bins(mut self, event_bins: Vec<EventBin>) -> Self {
        self.event_bins = event_bins;
        self
    }

    /// Replace the direct control columns.
    pub fn with_controls(mut self, controls: Vec<String>) -> Self {
        self.direct_controls = controls;
        self
    }

    /// Set the Newey-West lag order used by every regression.
    pub fn with_hac_lags(mut self, hac_lags: usize) -> Self {
        self.hac_lags = hac_lags;
        self
    }

    /// Override the bootstrap settings while preserving other defaults.
    pub fn with_bootstrap(mut self, bootstrap: BootstrapOptions) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Restrict the batch to the named series.
    pub fn with_dependent_series(mut self, series: Vec<String>) -> Self {
        self.dependent_series = Some(series);
        self
    }

    /// Restrict the batch to series with these tenors (years).
    pub fn with_tenor_subset(mut self, tenors: Vec<f64>) -> Self {
        self.tenor_subset = Some(tenors);
        self
    }

    /// Controls as borrowed names, in the form the estimators take.
    pub fn control_names(&self) -> Vec<&str> {
        self.direct_controls.iter().map(String::as_str).collect()
    }

    /// Checks the configuration before a batch run.
    pub fn validate(&self) -> Result<()> {
        if self.event_dates.is_empty() {
            return Err(EventStudyError::invalid_config("no event dates"));
        }
        if self.windows.is_empty() {
            return Err(EventStudyError::invalid_config("no jump windows"));
        }
        if self.bootstrap.reps == 0 {
            return Err(EventStudyError::invalid_config("bootstrap reps must be positive"));
        }
        if self.bootstrap.block_size == 0 {
            return Err(EventStudyError::invalid_config(
                "bootstrap block size must be positive",
            ));
        }
        validate_bins(&self.event_bins)
    }
}
