//! Ordinary least squares via the normal equations.

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: DVector<f64>,
    pub resid: DVector<f64>,
    pub ssr: f64,
    pub nobs: usize,
    /// `(X'X)^-1`; multiply by `scale()` for the parameter covariance.
    pub xtx_inv: DMatrix<f64>,
}

impl OlsFit {
    pub fn k(&self) -> usize {
        self.params.len()
    }

    pub fn df_resid(&self) -> f64 {
        self.nobs as f64 - self.k() as f64
    }

    /// Residual variance estimate `ssr / df_resid`.
    pub fn scale(&self) -> f64 {
        self.ssr / self.df_resid()
    }

    pub fn cov_params(&self) -> DMatrix<f64> {
        &self.xtx_inv * self.scale()
    }

    pub fn bse(&self, i: usize) -> f64 {
        (self.xtx_inv[(i, i)] * self.scale()).sqrt()
    }

    pub fn tvalue(&self, i: usize) -> f64 {
        self.params[i] / self.bse(i)
    }

    /// Gaussian log-likelihood at the MLE of the variance.
    pub fn llf(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    pub fn aic(&self) -> f64 {
        -2.0 * self.llf() + 2.0 * self.k() as f64
    }
}

/// Fit `y = X b + e`. `None` when `X'X` is singular or there are no residual
/// degrees of freedom.
pub fn ols(y: &DVector<f64>, x: &DMatrix<f64>) -> Option<OlsFit> {
    let (n, k) = x.shape();
    if n != y.len() || n <= k || k == 0 {
        return None;
    }
    let xt = x.transpose();
    let xtx_inv = (&xt * x).try_inverse()?;
    let params = &xtx_inv * (&xt * y);
    let resid = y - x * &params;
    let ssr = resid.dot(&resid);
    if !ssr.is_finite() {
        return None;
    }
    Some(OlsFit {
        params,
        resid,
        ssr,
        nobs: n,
        xtx_inv,
    })
}
