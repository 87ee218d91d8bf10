//! Result rows and tables shared by every estimator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Two-sided 95% normal critical value.
pub const Z_95: f64 = 1.96;

/// Columns of every result table.
pub const BASE_COLUMNS: [&str; 6] = ["term", "estimate", "se", "ci_low", "ci_high", "n"];

/// Extra columns carried by pooled and event-path tables.
pub const EVENT_PATH_COLUMNS: [&str; 4] = ["kind", "bin_mid", "ref_bin", "event_date"];

/// Role of a row in a pooled or event-path table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Group-0 coefficient on a post or bin indicator.
    BaselineBin,
    /// Incremental effect for group 1.
    InteractionBin,
    /// Group-0 effect path.
    Group0Effect,
    /// Baseline plus interaction.
    Group1Effect,
}

impl EffectKind {
    /// Snake-case name used in serialized tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaselineBin => "baseline_bin",
            Self::InteractionBin => "interaction_bin",
            Self::Group0Effect => "group0_effect",
            Self::Group1Effect => "group1_effect",
        }
    }
}

/// Which set of columns a table exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSchema {
    /// `term, estimate, se, ci_low, ci_high, n`.
    Basic,
    /// Basic columns plus `kind, bin_mid, ref_bin, event_date`.
    EventPath,
}

impl TableSchema {
    /// Column names, in output order.
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Self::Basic => BASE_COLUMNS.to_vec(),
            Self::EventPath => BASE_COLUMNS.iter().chain(EVENT_PATH_COLUMNS.iter()).copied().collect(),
        }
    }
}

/// A single estimated effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectRow {
    pub term: String,
    pub estimate: f64,
    pub se: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub n: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EffectKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_mid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_bin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<NaiveDate>,
}

impl EffectRow {
    /// Builds a row with a symmetric 95% normal interval.
    pub fn new(term: impl Into<String>, estimate: f64, se: f64, n: usize) -> Self {
        Self {
            term: term.into(),
            estimate,
            se,
            ci_low: estimate - Z_95 * se,
            ci_high: estimate + Z_95 * se,
            n,
            kind: None,
            bin_mid: None,
            ref_bin: None,
            event_date: None,
        }
    }

    /// Tags the row with its role in a pooled or event-path table.
    pub fn with_kind(mut self, kind: EffectKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Attach the midpoint of the row's event-time bin.
    pub fn with_bin_mid(mut self, bin_mid: f64) -> Self {
        self.bin_mid = Some(bin_mid);
        self
    }

    /// Attach the label of the omitted reference bin.
    pub fn with_ref_bin(mut self, ref_bin: impl Into<String>) -> Self {
        self.ref_bin = Some(ref_bin.into());
        self
    }

    /// Attach the event the row was estimated around.
    pub fn with_event_date(mut self, event_date: NaiveDate) -> Self {
        self.event_date = Some(event_date);
        self
    }
}

/// Ordered collection of [`EffectRow`]s with a fixed column schema.
///
/// An empty table still reports its columns, so degenerate estimations
/// remain well-shaped for downstream consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectTable {
    schema: TableSchema,
    rows: Vec<EffectRow>,
}

impl EffectTable {
    /// An empty table that still reports `schema`'s columns.
    pub fn empty(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Column layout of this table.
    pub fn schema(&self) -> TableSchema {
        self.schema
    }

    /// Column names of this table, even when it has no rows.
    pub fn columns(&self) -> Vec<&'static str> {
        self.schema.columns()
    }

    /// Appends a row.
    pub fn push(&mut self, row: EffectRow) {
        self.rows.push(row);
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[EffectRow] {
        &self.rows
    }

    /// Consumes the table, returning its rows.
    pub fn into_rows(self) -> Vec<EffectRow> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no effect could be estimated.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row with the given term.
    pub fn find(&self, term: &str) -> Option<&EffectRow> {
        self.rows.iter().find(|row| row.term == term)
    }

    /// First row with the given term and kind.
    pub fn find_kind(&self, term: &str, kind: EffectKind) -> Option<&EffectRow> {
        self.rows
            .iter()
            .find(|row| row.term == term && row.kind == Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_symmetric() {
        let row = EffectRow::new("post", 0.8, 0.1, 41);
        assert_eq!(row.ci_low, 0.8 - 1.96 * 0.1);
        assert_eq!(row.ci_high, 0.8 + 1.96 * 0.1);
    }

    #[test]
    fn empty_tables_keep_their_schema() {
        let basic = EffectTable::empty(TableSchema::Basic);
        assert!(basic.is_empty());
        assert_eq!(basic.columns(), vec!["term", "estimate", "se", "ci_low", "ci_high", "n"]);
        assert_eq!(EffectTable::empty(TableSchema::EventPath).columns().len(), 10);
    }

    #[test]
    fn rows_serialize_with_snake_case_kind() {
        let row = EffectRow::new("[0,0]", 1.0, 0.5, 10)
            .with_kind(EffectKind::Group1Effect)
            .with_bin_mid(0.0);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["kind"], "group1_effect");
        assert_eq!(json["bin_mid"], 0.0);
        assert!(json.get("ref_bin").is_none());
    }
}
