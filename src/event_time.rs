//! Event-time alignment and event-time bins.
//!
//! Event time counts positions in the sorted set of distinct dates present in
//! the panel, so weekends and holidays never inflate "days since event".

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EventStudyError, Result};
use crate::panel::Panel;

/// Bin used as the omitted category when the caller does not choose one.
pub const DEFAULT_REFERENCE_BIN: EventBin = EventBin { low: -20, high: -1 };

/// Position of the reference date within `sorted_dates`: the first date on or
/// after `event_date`, else the last available date. `None` if there are no
/// dates at all.
pub fn reference_position(sorted_dates: &[NaiveDate], event_date: NaiveDate) -> Option<usize> {
    if sorted_dates.is_empty() {
        return None;
    }
    let pos = sorted_dates.partition_point(|d| *d < event_date);
    Some(pos.min(sorted_dates.len() - 1))
}

/// Computes the signed event-time offset of every row.
///
/// Rows with a missing date get `None` and are excluded downstream.
pub fn event_time(panel: &Panel, event_date: NaiveDate) -> Vec<Option<i64>> {
    let clock = panel.distinct_dates();
    let Some(reference) = reference_position(&clock, event_date) else {
        return vec![None; panel.len()];
    };
    panel
        .dates()
        .iter()
        .map(|date| {
            date.and_then(|d| clock.binary_search(&d).ok())
                .map(|pos| pos as i64 - reference as i64)
        })
        .collect()
}

/// A closed interval `[low, high]` of event-time offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i64, i64)", into = "(i64, i64)")]
pub struct EventBin {
    pub low: i64,
    pub high: i64,
}

impl EventBin {
    pub const fn new(low: i64, high: i64) -> Self {
        Self { low, high }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, offset: i64) -> bool {
        self.low <= offset && offset <= self.high
    }

    /// Label formatted as `[low,high]`.
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Numeric midpoint used to plot event paths on a continuous axis.
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) as f64 / 2.0
    }

    /// Parses a `[low,high]` label back into a bin.
    pub fn parse(label: &str) -> Option<Self> {
        let inner = label.trim().strip_prefix('[')?.strip_suffix(']')?;
        let (low, high) = inner.split_once(',')?;
        Some(Self::new(low.trim().parse().ok()?, high.trim().parse().ok()?))
    }
}

impl fmt::Display for EventBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.low, self.high)
    }
}

impl From<(i64, i64)> for EventBin {
    fn from((low, high): (i64, i64)) -> Self {
        Self::new(low, high)
    }
}

impl From<EventBin> for (i64, i64) {
    fn from(bin: EventBin) -> Self {
        (bin.low, bin.high)
    }
}

/// Assigns each offset the first bin that contains it.
///
/// Overlapping bins resolve to the earliest one in `bins`; callers should
/// not rely on that tie-break.
pub fn assign_bins(offsets: &[Option<i64>], bins: &[EventBin]) -> Vec<Option<EventBin>> {
    offsets
        .iter()
        .map(|offset| offset.and_then(|t| bins.iter().copied().find(|bin| bin.contains(t))))
        .collect()
}

/// Label view of [`assign_bins`].
pub fn bin_labels(offsets: &[Option<i64>], bins: &[EventBin]) -> Vec<Option<String>> {
    assign_bins(offsets, bins)
        .into_iter()
        .map(|bin| bin.map(|b| b.label()))
        .collect()
}

/// Distinct bins present in `assigned`, ordered by midpoint then lower bound.
pub fn observed_bins(assigned: &[Option<EventBin>]) -> Vec<EventBin> {
    let mut observed: Vec<EventBin> = Vec::new();
    for bin in assigned.iter().flatten() {
        if !observed.contains(bin) {
            observed.push(*bin);
        }
    }
    observed.sort_by(|a, b| a.midpoint().total_cmp(&b.midpoint()).then(a.low.cmp(&b.low)));
    observed
}

/// Chooses the omitted bin among the observed ones.
///
/// A requested bin wins when it was observed. Otherwise `[-20,-1]` is used if
/// present, then the observed bin with the smallest midpoint.
pub fn choose_reference(observed: &[EventBin], requested: Option<EventBin>) -> Option<EventBin> {
    if let Some(bin) = requested {
        if observed.contains(&bin) {
            return Some(bin);
        }
        log::warn!("requested reference bin {bin} has no observations; using default choice");
    }
    if observed.contains(&DEFAULT_REFERENCE_BIN) {
        return Some(DEFAULT_REFERENCE_BIN);
    }
    observed.first().copied()
}

/// Rejects inverted or overlapping bins.
pub fn validate_bins(bins: &[EventBin]) -> Result<()> {
    if let Some(bin) = bins.iter().find(|b| b.low > b.high) {
        return Err(EventStudyError::InvalidBins {
            reason: format!("bin {bin} has low > high"),
        });
    }
    let mut sorted = bins.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        if pair[1].low <= pair[0].high {
            return Err(EventStudyError::InvalidBins {
                reason: format!("bins {} and {} overlap", pair[0], pair[1]),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::PanelBuilder;

    fn daily_panel(start: NaiveDate, n: usize) -> Panel {
        let dates = start.iter_days().take(n).map(Some).collect();
        PanelBuilder::new(dates)
            .numeric("y", vec![0.0; n])
            .build()
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn event_row_has_zero_offset() {
        let panel = daily_panel(date(2020, 1, 1), 10);
        let offsets = event_time(&panel, date(2020, 1, 5));
        assert_eq!(offsets[4], Some(0));
        assert_eq!(offsets[0], Some(-4));
        assert_eq!(offsets[9], Some(5));
    }

    #[test]
    fn clock_skips_missing_calendar_days() {
        // Fri, Mon, Tue with the event on Saturday.
        let dates = vec![
            Some(date(2021, 3, 19)),
            Some(date(2021, 3, 22)),
            Some(date(2021, 3, 23)),
            None,
        ];
        let panel = PanelBuilder::new(dates)
            .numeric("y", vec![1.0, 2.0, 3.0, 4.0])
            .build()
            .unwrap();
        let offsets = event_time(&panel, date(2021, 3, 20));
        assert_eq!(offsets, vec![Some(-1), Some(0), Some(1), None]);
    }

    #[test]
    fn event_after_sample_uses_last_date() {
        let panel = daily_panel(date(2020, 1, 1), 5);
        let offsets = event_time(&panel, date(2020, 6, 1));
        assert_eq!(offsets, vec![Some(-4), Some(-3), Some(-2), Some(-1), Some(0)]);
    }

    #[test]
    fn offsets_follow_date_order_for_repeated_dates() {
        let dates = vec![
            Some(date(2020, 1, 3)),
            Some(date(2020, 1, 1)),
            Some(date(2020, 1, 3)),
            Some(date(2020, 1, 2)),
        ];
        let panel = PanelBuilder::new(dates)
            .numeric("y", vec![0.0; 4])
            .build()
            .unwrap();
        let offsets = event_time(&panel, date(2020, 1, 2));
        assert_eq!(offsets, vec![Some(1), Some(-1), Some(1), Some(0)]);
    }

    #[test]
    fn bins_are_closed_intervals() {
        let offsets = vec![Some(-10), Some(-5), Some(0), Some(4), Some(12), None];
        let bins = [EventBin::new(-10, -1), EventBin::new(0, 0), EventBin::new(1, 10)];
        let labels = bin_labels(&offsets, &bins);
        assert_eq!(labels[0].as_deref(), Some("[-10,-1]"));
        assert_eq!(labels[1].as_deref(), Some("[-10,-1]"));
        assert_eq!(labels[2].as_deref(), Some("[0,0]"));
        assert_eq!(labels[3].as_deref(), Some("[1,10]"));
        assert_eq!(labels[4], None);
        assert_eq!(labels[5], None);
    }

    #[test]
    fn label_round_trips_to_midpoint() {
        let bin = EventBin::parse("[1, 20]").unwrap();
        assert_eq!(bin, EventBin::new(1, 20));
        assert_eq!(bin.midpoint(), 10.5);
        assert_eq!(EventBin::parse("1,20"), None);
    }

    #[test]
    fn reference_falls_back_to_earliest_bin() {
        let observed = vec![EventBin::new(0, 0), EventBin::new(-40, -21), EventBin::new(1, 20)];
        let mut sorted = observed.clone();
        sorted.sort_by(|a, b| a.midpoint().total_cmp(&b.midpoint()));
        assert_eq!(choose_reference(&sorted, None), Some(EventBin::new(-40, -21)));

        let with_default = vec![EventBin::new(-40, -21), DEFAULT_REFERENCE_BIN];
        assert_eq!(choose_reference(&with_default, None), Some(DEFAULT_REFERENCE_BIN));
        assert_eq!(
            choose_reference(&with_default, Some(EventBin::new(-40, -21))),
            Some(EventBin::new(-40, -21))
        );
        assert_eq!(
            choose_reference(&with_default, Some(EventBin::new(5, 9))),
            Some(DEFAULT_REFERENCE_BIN)
        );
    }

    #[test]
    fn validate_bins_rejects_overlap() {
        assert!(validate_bins(&[EventBin::new(-5, -1), EventBin::new(0, 3)]).is_ok());
        assert!(validate_bins(&[EventBin::new(-5, 0), EventBin::new(0, 3)]).is_err());
        assert!(validate_bins(&[EventBin::new(3, 1)]).is_err());
    }
}
