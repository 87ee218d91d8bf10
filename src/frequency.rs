//! Sampling-frequency classification from observed dates.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sampling frequency inferred from the median spacing of distinct dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Unknown,
}

impl Frequency {
    /// Classifies a date column. Fewer than three distinct dates, or a median
    /// gap beyond a quarter, gives [`Frequency::Unknown`].
    pub fn infer(dates: &[Option<NaiveDate>]) -> Self {
        let mut distinct: Vec<NaiveDate> = dates.iter().flatten().copied().collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 3 {
            return Self::Unknown;
        }

        let mut gaps: Vec<i64> = distinct
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .collect();
        gaps.sort_unstable();
        let mid = gaps.len() / 2;
        let median = if gaps.len() % 2 == 0 {
            (gaps[mid - 1] + gaps[mid]) as f64 / 2.0
        } else {
            gaps[mid] as f64
        };

        match median {
            m if m <= 1.0 => Self::Daily,
            m if m <= 7.0 => Self::Weekly,
            m if m <= 31.0 => Self::Monthly,
            m if m <= 92.0 => Self::Quarterly,
            _ => Self::Unknown,
        }
    }

    /// Lower-case label, as used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaced(step: u64, n: usize) -> Vec<Option<NaiveDate>> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n)
            .map(|i| start.checked_add_days(chrono::Days::new(step * i as u64)))
            .collect()
    }

    #[test]
    fn classifies_regular_spacings() {
        assert_eq!(Frequency::infer(&spaced(1, 30)), Frequency::Daily);
        assert_eq!(Frequency::infer(&spaced(7, 30)), Frequency::Weekly);
        assert_eq!(Frequency::infer(&spaced(30, 12)), Frequency::Monthly);
        assert_eq!(Frequency::infer(&spaced(91, 8)), Frequency::Quarterly);
        assert_eq!(Frequency::infer(&spaced(365, 8)), Frequency::Unknown);
    }

    #[test]
    fn business_days_are_daily_and_short_samples_unknown() {
        // Gaps 1,1,1,1,3.
        let mut dates = spaced(1, 5);
        dates.push(NaiveDate::from_ymd_opt(2020, 1, 8));
        assert_eq!(Frequency::infer(&dates), Frequency::Daily);
        assert_eq!(Frequency::infer(&spaced(1, 2)), Frequency::Unknown);
        assert_eq!(Frequency::infer(&[None, None, None]), Frequency::Unknown);
    }
}
