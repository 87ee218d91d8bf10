//! Ordinary least squares with Newey-West (HAC) covariance.
//!
//! The HAC estimator is the unscaled Bartlett form
//!
//! ```text
//! S = sum_t g_t g_t' + sum_{l=1}^{L} w_l (G_l + G_l'),   g_t = x_t u_t,
//! G_l = sum_{t >= l} g_t g_{t-l}',                     w_l = 1 - l/(L+1),
//! V = (X'X)^-1 S (X'X)^-1,
//! ```
//!
//! where lags `l >= n` contribute nothing but `w_l` keeps the requested `L`.
//! `L = 0` gives the White (HC0) covariance.

use nalgebra::{DMatrix, DVector};

use crate::error::{EventStudyError, Result};

/// Name of the intercept term added by [`Design::fit`].
pub const INTERCEPT: &str = "const";

/// Relative residual norm below which a column counts as collinear with the
/// columns before it.
const COLLINEAR_TOL: f64 = 1e-10;

/// Response vector plus named regressor columns, before the intercept is added.
#[derive(Clone, Debug)]
pub struct Design {
    response: Vec<f64>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Design {
    /// Starts a design from the response vector.
    pub fn new(response: Vec<f64>) -> Self {
        Self {
            response,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Appends a regressor column. Columns with a name already present are
    /// ignored.
    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.response.len() {
            return Err(EventStudyError::dimension_mismatch(
                "regressor length",
                self.response.len(),
                values.len(),
            ));
        }
        if !self.names.contains(&name) {
            self.names.push(name);
            self.columns.push(values);
        }
        Ok(())
    }

    /// Number of rows.
    pub fn nobs(&self) -> usize {
        self.response.len()
    }

    /// Number of regressors, excluding the intercept.
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// True when no regressor besides the intercept remains.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Regressor names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether a regressor with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Returns the values of a named regressor.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Whether a named regressor takes more than one distinct value.
    pub fn varies(&self, name: &str) -> bool {
        self.column(name).is_some_and(|values| !is_constant(values))
    }

    /// Removes regressors with no finite value at all and returns their names.
    pub fn drop_all_missing(&mut self) -> Vec<String> {
        self.retain_columns(|values| values.iter().any(|v| v.is_finite()))
    }

    /// Removes regressors that take a single value and returns their names.
    pub fn drop_constant(&mut self) -> Vec<String> {
        self.retain_columns(|values| !is_constant(values))
    }

    /// Keeps only rows where the response and every regressor are finite.
    pub fn complete_cases(self) -> Design {
        let keep: Vec<usize> = (0..self.nobs())
            .filter(|&row| {
                self.response[row].is_finite() && self.columns.iter().all(|c| c[row].is_finite())
            })
            .collect();
        Design {
            response: keep.iter().map(|&r| self.response[r]).collect(),
            names: self.names,
            columns: self
                .columns
                .iter()
                .map(|c| keep.iter().map(|&r| c[r]).collect())
                .collect(),
        }
    }

    fn retain_columns(&mut self, keep: impl Fn(&[f64]) -> bool) -> Vec<String> {
        let mut dropped = Vec::new();
        let mut names = Vec::with_capacity(self.names.len());
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, values) in self.names.drain(..).zip(self.columns.drain(..)) {
            if keep(&values) {
                names.push(name);
                columns.push(values);
            } else {
                dropped.push(name);
            }
        }
        self.names = names;
        self.columns = columns;
        dropped
    }

    /// Fits OLS with an intercept and HAC covariance at `hac_lags`.
    ///
    /// Columns that are exact linear combinations of earlier columns
    /// (intercept first) are pruned before solving and reported in
    /// [`RobustFit::dropped`].
    pub fn fit(&self, hac_lags: usize) -> Result<RobustFit> {
        let n = self.nobs();
        if n == 0 {
            return Err(EventStudyError::EmptyPanel { context: "OLS fit" });
        }

        let mut candidates = Vec::with_capacity(self.columns.len() + 1);
        candidates.push((INTERCEPT.to_string(), DVector::from_element(n, 1.0)));
        for (name, values) in self.names.iter().zip(&self.columns) {
            candidates.push((name.clone(), DVector::from_column_slice(values)));
        }

        let (kept, dropped) = prune_collinear(candidates);
        if !dropped.is_empty() {
            log::debug!("pruned collinear terms: {dropped:?}");
        }
        let (names, columns): (Vec<String>, Vec<DVector<f64>>) = kept.into_iter().unzip();

        let x = DMatrix::from_columns(&columns);
        let y = DVector::from_column_slice(&self.response);

        let xtx = x.tr_mul(&x);
        let xtx_inv = nalgebra::linalg::Cholesky::new(xtx)
            .ok_or_else(|| EventStudyError::singular("X'X"))?
            .inverse();
        let params = &xtx_inv * x.tr_mul(&y);
        let residuals = &y - &x * &params;

        let meat = newey_west_meat(&x, &residuals, hac_lags);
        let cov = &xtx_inv * meat * &xtx_inv;

        Ok(RobustFit {
            names,
            params,
            cov,
            residuals,
            nobs: n,
            hac_lags,
            dropped,
        })
    }
}

/// Bartlett taper weight for lag `lag` at bandwidth `bandwidth`.
pub fn bartlett_weight(lag: usize, bandwidth: usize) -> f64 {
    1.0 - lag as f64 / (bandwidth as f64 + 1.0)
}

/// Builds the HAC "meat" `S` from the regressors and OLS residuals.
fn newey_west_meat(x: &DMatrix<f64>, residuals: &DVector<f64>, lags: usize) -> DMatrix<f64> {
    let n = x.nrows();
    let scores = DMatrix::from_fn(n, x.ncols(), |i, j| x[(i, j)] * residuals[i]);
    let mut meat = scores.tr_mul(&scores);

    // Lags at or beyond `n` have no overlapping rows; the weights still use
    // the requested bandwidth.
    for lag in 1..=lags.min(n.saturating_sub(1)) {
        let lead = scores.rows(lag, n - lag);
        let trail = scores.rows(0, n - lag);
        let gamma = lead.tr_mul(&trail);
        let weight = bartlett_weight(lag, lags);
        meat += (&gamma + gamma.transpose()) * weight;
    }
    meat
}

fn prune_collinear(
    candidates: Vec<(String, DVector<f64>)>,
) -> (Vec<(String, DVector<f64>)>, Vec<String>) {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for (name, column) in candidates {
        let norm = column.norm();
        let mut residual = column.clone();
        for q in &basis {
            let proj = q.dot(&residual);
            residual.axpy(-proj, q, 1.0);
        }
        let residual_norm = residual.norm();
        if norm == 0.0 || residual_norm <= COLLINEAR_TOL * norm {
            dropped.push(name);
            continue;
        }
        basis.push(residual / residual_norm);
        kept.push((name, column));
    }
    (kept, dropped)
}

fn is_constant(values: &[f64]) -> bool {
    let mut finite = values.iter().filter(|v| v.is_finite());
    match finite.next() {
        Some(first) => finite.all(|v| v == first),
        None => true,
    }
}

/// An OLS fit carrying HAC-robust covariance.
#[derive(Clone, Debug)]
pub struct RobustFit {
    names: Vec<String>,
    params: DVector<f64>,
    cov: DMatrix<f64>,
    residuals: DVector<f64>,
    nobs: usize,
    hac_lags: usize,
    dropped: Vec<String>,
}

impl RobustFit {
    /// Term names in column order, intercept first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Column position of a term, if it survived the fit.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Whether a term survived the fit.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Point estimate for a term that survived the fit.
    pub fn estimate(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|idx| self.params[idx])
    }

    /// HAC variance of a term.
    pub fn variance(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|idx| self.cov[(idx, idx)])
    }

    /// HAC standard error of a term.
    pub fn std_error(&self, name: &str) -> Option<f64> {
        self.variance(name).map(|v| v.max(0.0).sqrt())
    }

    /// HAC covariance between two terms.
    pub fn covariance(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.cov[(self.index_of(a)?, self.index_of(b)?)])
    }

    /// Coefficient vector, ordered like [`names`](Self::names).
    pub fn params(&self) -> &DVector<f64> {
        &self.params
    }

    /// Full HAC covariance matrix, ordered like [`names`](Self::names).
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// OLS residuals in row order.
    pub fn residuals(&self) -> &DVector<f64> {
        &self.residuals
    }

    /// Number of observations used in the fit.
    pub fn nobs(&self) -> usize {
        self.nobs
    }

    /// Newey-West lag order the covariance was computed with.
    pub fn hac_lags(&self) -> usize {
        self.hac_lags
    }

    /// Terms removed as collinear before solving.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }
}

/// Newey-West covariance computed term by term, for cross-checking [`Design::fit`].
#[cfg(test)]
pub(crate) fn newey_west_by_hand(x: &DMatrix<f64>, y: &DVector<f64>, lags: usize) -> DMatrix<f64> {
    let (n, k) = x.shape();
    let bread = (x.transpose() * x).try_inverse().unwrap();
    let beta = &bread * x.transpose() * y;
    let u = y - x * &beta;

    let mut s = DMatrix::<f64>::zeros(k, k);
    for t in 0..n {
        for a in 0..k {
            for b in 0..k {
                s[(a, b)] += x[(t, a)] * u[t] * x[(t, b)] * u[t];
            }
        }
    }
    for l in 1..=lags.min(n - 1) {
        let w = 1.0 - l as f64 / (lags as f64 + 1.0);
        for t in l..n {
            for a in 0..k {
                for b in 0..k {
                    let g = x[(t, a)] * u[t] * x[(t - l, b)] * u[t - l];
                    s[(a, b)] += w * g;
                    s[(b, a)] += w * g;
                }
            }
        }
    }
    &bread * s * &bread
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn exact_linear_relation_is_recovered() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.0 + 2.0 * v).collect();
        let mut design = Design::new(y);
        design.push("x", x).unwrap();

        let fit = design.fit(2).unwrap();
        assert_relative_eq!(fit.estimate(INTERCEPT).unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.estimate("x").unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.std_error("x").unwrap(), 0.0, epsilon = 1e-6);
        assert_eq!(fit.nobs(), 10);
    }

    #[test]
    fn zero_lag_matches_white_covariance() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![0.3, 1.1, 2.6, 2.9, 4.4, 4.8];
        let mut design = Design::new(y.clone());
        design.push("x", x.clone()).unwrap();
        let fit = design.fit(0).unwrap();

        let xm = DMatrix::from_fn(6, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
        let ym = DVector::from_vec(y);
        let bread = (xm.transpose() * &xm).try_inverse().unwrap();
        let beta = &bread * xm.transpose() * &ym;
        let u = &ym - &xm * &beta;
        let omega = DMatrix::from_diagonal(&u.map(|e| e * e));
        let expected = &bread * xm.transpose() * omega * &xm * &bread;

        assert_relative_eq!(fit.params().clone(), beta, epsilon = 1e-10);
        assert_relative_eq!(fit.cov().clone(), expected, epsilon = 1e-10);
    }

    #[test]
    fn one_lag_adds_bartlett_weighted_autocovariance() {
        let y = vec![1.0, 3.0, 2.0, 5.0, 4.0];
        let design = Design::new(y.clone());
        let fit = design.fit(1).unwrap();

        // Intercept only: g_t = u_t, (X'X)^-1 = 1/n.
        let mean = y.iter().sum::<f64>() / 5.0;
        let u: Vec<f64> = y.iter().map(|v| v - mean).collect();
        let s0: f64 = u.iter().map(|e| e * e).sum();
        let s1: f64 = (1..5).map(|t| u[t] * u[t - 1]).sum();
        let expected = (s0 + 0.5 * 2.0 * s1) / 25.0;
        assert_relative_eq!(fit.variance(INTERCEPT).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn lagged_covariance_matches_term_by_term_sums() {
        let n = 14;
        let x1: Vec<f64> = (0..n).map(|i| ((i * 5) % 7) as f64 - 3.0).collect();
        let x2: Vec<f64> = (0..n).map(|i| (i as f64 / 3.0).sin()).collect();
        let y: Vec<f64> = (0..n)
            .map(|i| 0.4 + 1.5 * x1[i] - 0.7 * x2[i] + 0.2 * ((i * 11) % 5) as f64)
            .collect();
        let mut design = Design::new(y.clone());
        design.push("x1", x1.clone()).unwrap();
        design.push("x2", x2.clone()).unwrap();
        let fit = design.fit(3).unwrap();

        let xm = DMatrix::from_fn(n, 3, |i, j| match j {
            0 => 1.0,
            1 => x1[i],
            _ => x2[i],
        });
        let expected = newey_west_by_hand(&xm, &DVector::from_vec(y), 3);
        assert_relative_eq!(fit.cov().clone(), expected, epsilon = 1e-12);
        assert!(fit.covariance("x1", "x2").unwrap().abs() > 0.0);
    }

    #[test]
    fn lags_beyond_sample_keep_requested_bandwidth() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let y = vec![0.2, 1.3, 1.7, 3.4, 3.9, 5.6, 5.8, 7.3];
        let mut design = Design::new(y.clone());
        design.push("x", x.clone()).unwrap();
        let fit = design.fit(12).unwrap();

        let xm = DMatrix::from_fn(8, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
        let expected = newey_west_by_hand(&xm, &DVector::from_vec(y), 12);
        assert_relative_eq!(fit.cov().clone(), expected, epsilon = 1e-12);
        assert_eq!(bartlett_weight(7, 12), 1.0 - 7.0 / 13.0);
    }

    #[test]
    fn collinear_columns_are_pruned_in_order() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 6.0];
        let twice: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let mut design = Design::new(vec![1.0, 2.0, 2.5, 4.5, 5.0]);
        design.push("x", x).unwrap();
        design.push("level", vec![3.0; 5]).unwrap();
        design.push("twice", twice).unwrap();

        let fit = design.fit(1).unwrap();
        assert_eq!(fit.names(), &[INTERCEPT.to_string(), "x".to_string()]);
        assert_eq!(fit.dropped(), &["level".to_string(), "twice".to_string()]);
    }

    #[test]
    fn complete_cases_and_column_filters() {
        let mut design = Design::new(vec![1.0, f64::NAN, 3.0, 4.0]);
        design.push("a", vec![1.0, 2.0, f64::NAN, 5.0]).unwrap();
        design.push("gone", vec![f64::NAN; 4]).unwrap();
        design.push("flat", vec![2.0, 2.0, 2.0, 2.0]).unwrap();

        assert_eq!(design.drop_all_missing(), vec!["gone".to_string()]);
        let mut design = design.complete_cases();
        assert_eq!(design.nobs(), 2);
        assert_eq!(design.column("a").unwrap(), &[1.0, 5.0]);
        assert_eq!(design.drop_constant(), vec!["flat".to_string()]);
        assert!(design.varies("a"));
    }

    #[test]
    fn push_rejects_wrong_length() {
        let mut design = Design::new(vec![1.0, 2.0]);
        assert!(design.push("x", vec![1.0]).is_err());
    }
}
