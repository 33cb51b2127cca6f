//! Granger causality: does the history of `x` improve a linear forecast of `y`?
//!
//! For each lag `p` two OLS models are fitted on `t = p..n`:
//! - restricted: `y_t ~ 1 + y_{t-1..t-p}`
//! - unrestricted: `y_t ~ 1 + y_{t-1..t-p} + x_{t-1..t-p}`
//!
//! and four statistics are reported for `H0: x does not cause y`.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

use super::ols::{ols, OlsFit};

pub const TESTS: [&str; 4] = ["ssr_ftest", "ssr_chi2test", "lrtest", "params_ftest"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagResult {
    pub lag: usize,
    /// p-values in [`TESTS`] order.
    pub p_values: [f64; 4],
}

/// All four p-values at one lag. `None` when a model cannot be fitted.
pub fn test_lag(y: &[f64], x: &[f64], lag: usize) -> Option<LagResult> {
    let n = y.len();
    if lag == 0 || n != x.len() || n <= 2 * lag + 1 {
        return None;
    }
    let nobs = n - lag;

    let target = DVector::from_iterator(nobs, y[lag..].iter().copied());
    let restricted = DMatrix::from_fn(nobs, lag + 1, |i, j| {
        let t = i + lag;
        if j == 0 { 1.0 } else { y[t - j] }
    });
    let unrestricted = DMatrix::from_fn(nobs, 2 * lag + 1, |i, j| {
        let t = i + lag;
        match j {
            0 => 1.0,
            j if j <= lag => y[t - j],
            j => x[t - (j - lag)],
        }
    });

    let r = ols(&target, &restricted)?;
    let u = ols(&target, &unrestricted)?;
    let df_u = u.df_resid();
    if df_u <= 0.0 || u.ssr <= 0.0 {
        return None;
    }
    let p = lag as f64;

    let f_dist = FisherSnedecor::new(p, df_u).ok()?;
    let chi = ChiSquared::new(p).ok()?;

    let f = (r.ssr - u.ssr) / u.ssr / p * df_u;
    let chi2 = nobs as f64 * (r.ssr - u.ssr) / u.ssr;
    let lr = -2.0 * (r.llf() - u.llf());
    let wald = params_f(&u, lag)?;

    Some(LagResult {
        lag,
        p_values: [
            f_dist.sf(f.max(0.0)),
            chi.sf(chi2.max(0.0)),
            chi.sf(lr.max(0.0)),
            f_dist.sf(wald.max(0.0)),
        ],
    })
}

/// Wald F statistic for the `x` lag coefficients of the unrestricted fit.
fn params_f(u: &OlsFit, lag: usize) -> Option<f64> {
    let k = u.k();
    let idx: Vec<usize> = (lag + 1..k).collect();
    let b = DVector::from_iterator(idx.len(), idx.iter().map(|&i| u.params[i]));
    let cov = u.cov_params();
    let sub = DMatrix::from_fn(idx.len(), idx.len(), |i, j| cov[(idx[i], idx[j])]);
    let inv = sub.try_inverse()?;
    let stat = (b.transpose() * inv * &b)[(0, 0)] / idx.len() as f64;
    stat.is_finite().then_some(stat)
}

/// At most 10 lags spread evenly over `[1, min(n/5, 30)]`, deduplicated.
pub fn lag_grid(n: usize) -> Vec<usize> {
    let max_lag = (n / 5).min(30);
    if max_lag == 0 {
        return Vec::new();
    }
    let count = max_lag.min(10);
    if count == 1 {
        return vec![1];
    }
    let step = (max_lag - 1) as f64 / (count - 1) as f64;
    let mut lags: Vec<usize> = (0..count)
        .map(|i| (1.0 + step * i as f64).round() as usize)
        .collect();
    lags.dedup();
    lags
}
