//! Long-format outcome records and their conversion into estimation panels.
//!
//! Upstream loaders reshape wide per-strategy files into
//! `(date, strategy, series, tenor, value, treasury_based)` records; this
//! module cleans those records and splits them into one [`Panel`] per series,
//! or stacks them into a single pooled panel.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::StudyConfig;
use crate::panel::{Panel, PanelBuilder};
use crate::units::UnitPolicy;

/// Outcome column of every series panel.
pub const VALUE_COLUMN: &str = "value";
/// Absolute value of the outcome, for dislocation-size regressions.
pub const VALUE_ABS_COLUMN: &str = "value_abs";
/// Treasury-based indicator column (1 for Treasury strategies, else 0).
pub const TREASURY_COLUMN: &str = "treasury_based";
/// Entity identifier column of the pooled panel.
pub const ENTITY_COLUMN: &str = "entity";
/// Strategy whose series are quoted independently, one per equity index.
pub const EQUITY_STRATEGY: &str = "Equity_SpotFutures";

/// One observation of a dislocation measure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub date: Option<NaiveDate>,
    pub strategy: String,
    pub series: String,
    /// Maturity in years, if the series has one.
    pub tenor: Option<f64>,
    /// Value in basis points.
    pub value: f64,
    pub treasury_based: bool,
}

/// Identifies one outcome series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesKey {
    pub strategy: String,
    pub series: String,
    pub tenor: Option<f64>,
}

impl SeriesKey {
    fn of(record: &OutcomeRecord) -> Self {
        Self {
            strategy: record.strategy.clone(),
            series: record.series.clone(),
            tenor: record.tenor,
        }
    }

    /// Totally ordered form of the key, for map lookups.
    fn ordered(&self) -> (String, String, Option<u64>) {
        (
            self.strategy.clone(),
            self.series.clone(),
            self.tenor.map(f64::to_bits),
        )
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tenor {
            Some(tenor) => write!(f, "{}/{}/{}", self.strategy, self.series, tenor),
            None => write!(f, "{}/{}", self.strategy, self.series),
        }
    }
}

fn cmp_tenor(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn same_observation(a: &OutcomeRecord, b: &OutcomeRecord) -> bool {
    a.date == b.date && a.series == b.series && cmp_tenor(a.tenor, b.tenor) == Ordering::Equal
}

/// Cleans raw records.
///
/// Drops records without a date or with a non-finite value, sorts by
/// `(series, tenor, date)` and keeps the last record for each
/// `(date, tenor, series)` key.
pub fn validate_records(records: Vec<OutcomeRecord>) -> Vec<OutcomeRecord> {
    let mut kept: Vec<OutcomeRecord> = records
        .into_iter()
        .filter(|r| r.date.is_some() && r.value.is_finite())
        .collect();
    kept.sort_by(|a, b| {
        a.series
            .cmp(&b.series)
            .then_with(|| cmp_tenor(a.tenor, b.tenor))
            .then_with(|| a.date.cmp(&b.date))
    });

    let mut out: Vec<OutcomeRecord> = Vec::with_capacity(kept.len());
    for record in kept {
        match out.last_mut() {
            Some(last) if same_observation(last, &record) => *last = record,
            _ => out.push(record),
        }
    }
    out
}

/// Records that share one unit decision: a whole strategy, except equity
/// spot-futures where every index is quoted on its own.
fn unit_group(record: &OutcomeRecord) -> (String, Option<String>) {
    let series = (record.strategy == EQUITY_STRATEGY).then(|| record.series.clone());
    (record.strategy.clone(), series)
}

/// Applies a unit policy group by group: once per strategy, and once per
/// index for [`EQUITY_STRATEGY`].
pub fn normalize_units(records: &mut [OutcomeRecord], policy: &dyn UnitPolicy) {
    let mut groups: BTreeMap<(String, Option<String>), Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        groups.entry(unit_group(record)).or_default().push(i);
    }
    for positions in groups.into_values() {
        let values: Vec<f64> = positions.iter().map(|&i| records[i].value).collect();
        for (&i, value) in positions.iter().zip(policy.to_bps(&values)) {
            records[i].value = value;
        }
    }
}

fn selected(key: &SeriesKey, config: &StudyConfig) -> bool {
    let series_ok = config
        .dependent_series
        .as_ref()
        .map_or(true, |names| names.iter().any(|n| *n == key.series));
    let tenor_ok = config.tenor_subset.as_ref().map_or(true, |tenors| {
        key.tenor
            .is_some_and(|t| tenors.iter().any(|s| (s - t).abs() < 1e-9))
    });
    series_ok && tenor_ok
}

/// Groups records by series in order of first appearance, honouring the
/// config's series and tenor subsets.
fn group_records<'a>(
    records: &'a [OutcomeRecord],
    config: &StudyConfig,
) -> Vec<(SeriesKey, Vec<&'a OutcomeRecord>)> {
    let mut groups: Vec<(SeriesKey, Vec<&OutcomeRecord>)> = Vec::new();
    let mut index: BTreeMap<(String, String, Option<u64>), usize> = BTreeMap::new();
    for record in records {
        let key = SeriesKey::of(record);
        if !selected(&key, config) {
            continue;
        }
        match index.get(&key.ordered()) {
            Some(&slot) => groups[slot].1.push(record),
            None => {
                index.insert(key.ordered(), groups.len());
                groups.push((key, vec![record]));
            }
        }
    }
    groups
}

fn records_panel(records: &[&OutcomeRecord], entity: Option<&[String]>) -> Result<Panel> {
    let mut builder = PanelBuilder::new(records.iter().map(|r| r.date).collect())
        .numeric(VALUE_COLUMN, records.iter().map(|r| r.value).collect())
        .numeric(VALUE_ABS_COLUMN, records.iter().map(|r| r.value.abs()).collect())
        .numeric(
            TREASURY_COLUMN,
            records
                .iter()
                .map(|r| if r.treasury_based { 1.0 } else { 0.0 })
                .collect(),
        );
    if let Some(entity) = entity {
        builder = builder.text(ENTITY_COLUMN, entity.iter().cloned().map(Some).collect());
    }
    builder.build()
}

/// One panel per selected series, with columns `value`, `value_abs` and
/// `treasury_based`.
pub fn series_panels(
    records: &[OutcomeRecord],
    config: &StudyConfig,
) -> Result<Vec<(SeriesKey, Panel)>> {
    group_records(records, config)
        .into_iter()
        .map(|(key, members)| Ok((key, records_panel(&members, None)?)))
        .collect()
}

/// All selected series stacked into one panel with an `entity` column, for
/// pooled regressions with `treasury_based` as the treatment group.
pub fn pooled_panel(records: &[OutcomeRecord], config: &StudyConfig) -> Result<Panel> {
    let mut members = Vec::new();
    let mut entity = Vec::new();
    for (key, group) in group_records(records, config) {
        let label = key.to_string();
        entity.extend(std::iter::repeat(label).take(group.len()));
        members.extend(group);
    }
    records_panel(&members, Some(entity.as_slice()))
}
