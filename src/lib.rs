//! Event-study estimation for market-dislocation time series.
//!
//! Given a date-indexed panel of outcomes and controls, this crate measures
//! how outcomes move around regulatory event dates. It offers tools to
//!
//! - hold date-indexed columns and merge external controls (`panel` module),
//! - map calendar dates to event time and event-time bins (`event_time` module),
//! - fit OLS with Newey-West (HAC) covariance (`ols` module),
//! - estimate post-event jumps with HAC or block-bootstrap errors (`jump`,
//!   `bootstrap` modules),
//! - estimate binned event paths, alone or pooled across a treatment group
//!   with entity fixed effects (`binned`, `pooled` modules), and
//! - run whole batches of series, events and windows (`summary` module).
//!
//! Estimators never abort on a thin or degenerate sample. They return NaN
//! estimates or empty, well-shaped tables instead; errors are reserved for
//! malformed inputs such as a missing outcome column.
//!
//! # Quick start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use evstudy::{binned_regression, estimate_jump, EventBin, PanelBuilder};
//!
//! let dates = ["2021-03-15", "2021-03-16", "2021-03-17", "2021-03-18"];
//! let panel = PanelBuilder::from_date_strings(&dates)
//!     .numeric("value", vec![1.0, 1.2, 3.1, 2.9])
//!     .numeric("sofr", vec![0.05, 0.05, 0.04, 0.04])
//!     .build()
//!     .expect("columns match the date index");
//!
//! let event = NaiveDate::from_ymd_opt(2021, 3, 17).unwrap();
//! let jump = estimate_jump(&panel, "value", event, 5, &["sofr"], 5).expect("outcome present");
//! println!("jump {} (se {}, n {})", jump.estimate, jump.se, jump.n);
//!
//! let bins = [EventBin::new(-20, -1), EventBin::new(0, 0), EventBin::new(1, 20)];
//! let path = binned_regression(&panel, "value", event, &bins, &[], 5).expect("outcome present");
//! for row in path.rows() {
//!     println!("{}: {} [{}, {}]", row.term, row.estimate, row.ci_low, row.ci_high);
//! }
//! ```

pub mod binned;
pub mod bootstrap;
pub mod error;
pub mod event_time;
pub mod frequency;
pub mod jump;
pub mod ols;
pub mod options;
pub mod outcomes;
pub mod panel;
pub mod pooled;
pub mod summary;
pub mod table;
pub mod units;

pub use binned::binned_regression;
pub use bootstrap::{bootstrap_se, BootstrapOptions};
pub use error::{EventStudyError, Result};
pub use event_time::EventBin;
pub use jump::{estimate_jump, JumpEstimate};
pub use options::StudyConfig;
pub use panel::{Panel, PanelBuilder};
pub use pooled::{pooled_binned, pooled_jump};
pub use summary::{run_event_paths, run_jump_summary, run_pooled, JumpResult, JumpSpec};
pub use table::{EffectKind, EffectRow, EffectTable};
