//! Unit normalisation of spread series to basis points.

/// Converts a series to basis points.
pub trait UnitPolicy {
    fn to_bps(&self, values: &[f64]) -> Vec<f64>;
}

/// Leaves values untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl UnitPolicy for Identity {
    fn to_bps(&self, values: &[f64]) -> Vec<f64> {
        values.to_vec()
    }
}

/// Treats a series whose median absolute value is below `threshold` as being
/// quoted in percent and scales it by `multiplier`.
#[derive(Clone, Copy, Debug)]
pub struct MedianMagnitude {
    pub threshold: f64,
    pub multiplier: f64,
}

impl Default for MedianMagnitude {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            multiplier: 100.0,
        }
    }
}

impl MedianMagnitude {
    /// Median absolute value of the finite entries, if any.
    pub fn median_magnitude(values: &[f64]) -> Option<f64> {
        let mut magnitudes: Vec<f64> = values
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| v.abs())
            .collect();
        if magnitudes.is_empty() {
            return None;
        }
        magnitudes.sort_by(f64::total_cmp);
        let mid = magnitudes.len() / 2;
        Some(if magnitudes.len() % 2 == 0 {
            (magnitudes[mid - 1] + magnitudes[mid]) / 2.0
        } else {
            magnitudes[mid]
        })
    }
}

impl UnitPolicy for MedianMagnitude {
    fn to_bps(&self, values: &[f64]) -> Vec<f64> {
        match Self::median_magnitude(values) {
            Some(median) if median < self.threshold => {
                values.iter().map(|v| v * self.multiplier).collect()
            }
            _ => values.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_quotes_are_scaled() {
        let scaled = MedianMagnitude::default().to_bps(&[0.4, -0.2, f64::NAN, 0.1]);
        assert_eq!(scaled[0], 40.0);
        assert_eq!(scaled[1], -20.0);
        assert!(scaled[2].is_nan());
    }

    #[test]
    fn basis_point_quotes_are_kept() {
        let values = [12.0, -30.0, 8.0];
        assert_eq!(MedianMagnitude::default().to_bps(&values), values.to_vec());
        assert_eq!(Identity.to_bps(&[0.1]), vec![0.1]);
    }

    #[test]
    fn threshold_is_configurable() {
        let policy = MedianMagnitude {
            threshold: 50.0,
            multiplier: 10.0,
        };
        assert_eq!(policy.to_bps(&[12.0, 20.0, 8.0]), vec![120.0, 200.0, 80.0]);
        assert_eq!(MedianMagnitude::median_magnitude(&[f64::NAN]), None);
    }
}
