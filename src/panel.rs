//! In-memory panel containers and validation utilities used by the estimators.
//!
//! A [`Panel`] is a date column plus any number of named columns holding
//! either numbers or text. Missing or unparseable values are represented as
//! `NaN` (numeric) or `None` (text/date) and are removed by the complete-case
//! step of each estimator rather than raised.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{EventStudyError, Result};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses a calendar date, truncating timestamps to their date. Returns `None`
/// for anything unrecognised.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Values stored in a single panel column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValues {
    /// Numeric values; `NaN` marks a missing entry.
    Numeric(Vec<f64>),
    /// Free-form labels; `None` marks a missing entry.
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    /// Number of entries in the column.
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coerces the column to numbers. Text that does not parse becomes `NaN`.
    pub fn to_numeric(&self) -> Vec<f64> {
        match self {
            Self::Numeric(values) => values.clone(),
            Self::Text(values) => values
                .iter()
                .map(|value| {
                    value
                        .as_deref()
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                })
                .collect(),
        }
    }

    /// Renders the column as category labels. `NaN` becomes `None`.
    pub fn to_labels(&self) -> Vec<Option<String>> {
        match self {
            Self::Numeric(values) => values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(v.to_string()) })
                .collect(),
            Self::Text(values) => values.clone(),
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Numeric(values) => Self::Numeric(rows.iter().map(|&r| values[r]).collect()),
            Self::Text(values) => Self::Text(rows.iter().map(|&r| values[r].clone()).collect()),
        }
    }

    fn gather(&self, rows: &[Option<usize>]) -> Self {
        match self {
            Self::Numeric(values) => Self::Numeric(
                rows.iter()
                    .map(|row| row.map_or(f64::NAN, |r| values[r]))
                    .collect(),
            ),
            Self::Text(values) => Self::Text(
                rows.iter()
                    .map(|row| row.and_then(|r| values[r].clone()))
                    .collect(),
            ),
        }
    }
}

/// A long-or-wide panel of observations keyed by date.
///
/// Rows keep the caller's order; estimators never reorder them, so serial
/// dependence in HAC and bootstrap calculations follows this order.
#[derive(Clone, Debug)]
pub struct Panel {
    dates: Vec<Option<NaiveDate>>,
    names: Vec<String>,
    columns: Vec<ColumnValues>,
}

impl Panel {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Returns the date column.
    pub fn dates(&self) -> &[Option<NaiveDate>] {
        &self.dates
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Returns a read-only view of a named column.
    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
    }

    /// Numeric view of a column, if present.
    pub fn numeric(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name).map(ColumnValues::to_numeric)
    }

    /// Numeric view of a column, failing with a lookup error if absent.
    pub fn require_numeric(&self, name: &str) -> Result<Vec<f64>> {
        self.numeric(name)
            .ok_or_else(|| EventStudyError::missing_column(name))
    }

    /// Label view of a column, failing with a lookup error if absent.
    pub fn require_labels(&self, name: &str) -> Result<Vec<Option<String>>> {
        self.column(name)
            .map(ColumnValues::to_labels)
            .ok_or_else(|| EventStudyError::missing_column(name))
    }

    /// Distinct non-missing dates, sorted ascending.
    pub fn distinct_dates(&self) -> Vec<NaiveDate> {
        self.dates
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Builds a new panel from the given row positions. Positions may repeat.
    ///
    /// # Panics
    ///
    /// Panics if a position is out of bounds.
    pub fn take(&self, rows: &[usize]) -> Panel {
        Panel {
            dates: rows.iter().map(|&r| self.dates[r]).collect(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }

    /// Left-joins `other`'s columns onto this panel by date.
    ///
    /// The first row of `other` carrying a date is used for that date; columns
    /// whose names already exist here are skipped. Fails with
    /// [`EventStudyError::CatastrophicMerge`] when fewer than half of the
    /// distinct base dates find a match.
    pub fn left_join_on_date(&self, other: &Panel) -> Result<Panel> {
        let base_dates = self.distinct_dates();
        if base_dates.is_empty() {
            return Err(EventStudyError::EmptyPanel {
                context: "date join",
            });
        }

        let mut lookup: HashMap<NaiveDate, usize> = HashMap::new();
        for (row, date) in other.dates.iter().enumerate() {
            if let Some(date) = date {
                lookup.entry(*date).or_insert(row);
            }
        }

        let matched = base_dates.iter().filter(|d| lookup.contains_key(d)).count();
        let match_rate = matched as f64 / base_dates.len() as f64;
        if match_rate < 0.5 {
            return Err(EventStudyError::CatastrophicMerge { match_rate });
        }
        log::info!("merge match rate: {:.2}%", match_rate * 100.0);

        let rows: Vec<Option<usize>> = self
            .dates
            .iter()
            .map(|date| date.and_then(|d| lookup.get(&d).copied()))
            .collect();

        let mut joined = self.clone();
        for (name, values) in other.names.iter().zip(other.columns.iter()) {
            if joined.has_column(name) {
                log::debug!("date join keeps existing column `{name}`");
                continue;
            }
            joined.names.push(name.clone());
            joined.columns.push(values.gather(&rows));
        }
        Ok(joined)
    }
}

/// Builder that validates column lengths before constructing a [`Panel`].
///
/// A column whose name was already added is ignored, so duplicate columns
/// collapse to their first occurrence.
#[derive(Debug)]
pub struct PanelBuilder {
    dates: Vec<Option<NaiveDate>>,
    names: Vec<String>,
    columns: Vec<ColumnValues>,
}

impl PanelBuilder {
    /// Start building a panel from its date column.
    pub fn new(dates: Vec<Option<NaiveDate>>) -> Self {
        Self {
            dates,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Start building a panel from raw date strings; unparseable entries
    /// become missing dates.
    pub fn from_date_strings<S: AsRef<str>>(dates: &[S]) -> Self {
        Self::new(dates.iter().map(|d| parse_date(d.as_ref())).collect())
    }

    /// Adds a numeric column.
    pub fn numeric(self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.push(name.into(), ColumnValues::Numeric(values))
    }

    /// Adds a text column; values are coerced on demand by the estimators.
    pub fn text(self, name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        self.push(name.into(), ColumnValues::Text(values))
    }

    fn push(mut self, name: String, values: ColumnValues) -> Self {
        if self.names.contains(&name) {
            log::warn!("duplicate column `{name}` ignored; keeping first occurrence");
            return self;
        }
        self.names.push(name);
        self.columns.push(values);
        self
    }

    /// Finalizes construction after validating that every column matches the
    /// date column's length.
    pub fn build(self) -> Result<Panel> {
        let n = self.dates.len();
        for values in &self.columns {
            if values.len() != n {
                return Err(EventStudyError::dimension_mismatch(
                    "panel column length",
                    n,
                    values.len(),
                ));
            }
        }
        Ok(Panel {
            dates: self.dates,
            names: self.names,
            columns: self.columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn parse_date_accepts_common_layouts() {
        assert_eq!(parse_date("2020-03-15"), d(2020, 3, 15));
        assert_eq!(parse_date("2020/03/15"), d(2020, 3, 15));
        assert_eq!(parse_date("2020-03-15 16:30:00"), d(2020, 3, 15));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn builder_keeps_first_duplicate_column() {
        let panel = PanelBuilder::new(vec![d(2020, 1, 1), d(2020, 1, 2)])
            .numeric("y", vec![1.0, 2.0])
            .numeric("y", vec![9.0, 9.0])
            .build()
            .unwrap();
        assert_eq!(panel.column_names(), &["y".to_string()]);
        assert_eq!(panel.numeric("y").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn builder_detects_length_mismatch() {
        let result = PanelBuilder::new(vec![d(2020, 1, 1), d(2020, 1, 2)])
            .numeric("y", vec![1.0])
            .build();
        assert!(matches!(
            result,
            Err(EventStudyError::DimensionMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn text_columns_coerce_to_numbers() {
        let panel = PanelBuilder::new(vec![d(2020, 1, 1), d(2020, 1, 2), d(2020, 1, 3)])
            .text(
                "x",
                vec![Some("1.5".into()), Some("n/a".into()), None],
            )
            .build()
            .unwrap();
        let x = panel.numeric("x").unwrap();
        assert_eq!(x[0], 1.5);
        assert!(x[1].is_nan());
        assert!(x[2].is_nan());
        assert!(matches!(
            panel.require_numeric("z"),
            Err(EventStudyError::MissingColumn { column }) if column == "z"
        ));
    }

    #[test]
    fn left_join_aligns_on_dates() {
        let base = PanelBuilder::new(vec![d(2020, 1, 1), d(2020, 1, 2), d(2020, 1, 3), None])
            .numeric("value", vec![1.0, 2.0, 3.0, 4.0])
            .build()
            .unwrap();
        let controls = PanelBuilder::new(vec![d(2020, 1, 3), d(2020, 1, 1)])
            .numeric("sofr", vec![0.3, 0.1])
            .numeric("value", vec![7.0, 7.0])
            .build()
            .unwrap();

        let joined = base.left_join_on_date(&controls).unwrap();
        let sofr = joined.numeric("sofr").unwrap();
        assert_eq!(sofr[0], 0.1);
        assert!(sofr[1].is_nan());
        assert_eq!(sofr[2], 0.3);
        assert!(sofr[3].is_nan());
        assert_eq!(joined.numeric("value").unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn left_join_rejects_catastrophic_match_rate() {
        let base = PanelBuilder::new(vec![d(2020, 1, 1), d(2020, 1, 2), d(2020, 1, 3)])
            .numeric("value", vec![1.0, 2.0, 3.0])
            .build()
            .unwrap();
        let controls = PanelBuilder::new(vec![d(2020, 1, 3), d(2021, 1, 1)])
            .numeric("sofr", vec![0.3, 0.1])
            .build()
            .unwrap();
        assert!(matches!(
            base.left_join_on_date(&controls),
            Err(EventStudyError::CatastrophicMerge { .. })
        ));
    }
}
