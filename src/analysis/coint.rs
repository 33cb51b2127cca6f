//! Engle-Granger two-step cointegration test.
//!
//! 1. Regress `y` on `[1, x]`.
//! 2. Run an augmented Dickey-Fuller test (no constant, lag chosen by AIC) on
//!    the residuals and convert the statistic with MacKinnon's (1994)
//!    response surface for two variables with a constant.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use super::ols::ols;

const MIN_OBS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CointResult {
    pub stat: f64,
    pub p_value: f64,
    /// Augmentation lag selected for the residual ADF regression.
    pub lag: usize,
}

pub fn engle_granger(y: &[f64], x: &[f64]) -> Option<CointResult> {
    let n = y.len();
    if n != x.len() || n < MIN_OBS {
        return None;
    }
    let target = DVector::from_column_slice(y);
    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let fit = ols(&target, &design)?;
    let resid: Vec<f64> = fit.resid.iter().copied().collect();

    let (stat, lag) = adf_no_constant(&resid)?;
    Some(CointResult {
        stat,
        p_value: mackinnon_p_coint2(stat),
        lag,
    })
}

/// ADF t-statistic without deterministic terms: `Δe_t = γ e_{t-1} + Σ δ_i Δe_{t-i}`.
/// Lag is chosen by minimum AIC on a common sample, then refitted.
pub fn adf_no_constant(series: &[f64]) -> Option<(f64, usize)> {
    let n = series.len();
    let max_lag = default_max_lag(n).min((n / 2).saturating_sub(1));
    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let best = (0..=max_lag)
        .filter_map(|lag| {
            let fit = adf_fit(series, &diff, lag, max_lag)?;
            Some((lag, fit.aic()))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(lag, _)| lag)?;

    let fit = adf_fit(series, &diff, best, best)?;
    let stat = fit.tvalue(0);
    stat.is_finite().then_some((stat, best))
}

/// Rows start at `skip` differences in so fits with different lags share a sample.
fn adf_fit(level: &[f64], diff: &[f64], lag: usize, skip: usize) -> Option<super::ols::OlsFit> {
    if diff.len() <= skip + lag + 1 {
        return None;
    }
    let rows = diff.len() - skip;
    let target = DVector::from_iterator(rows, diff[skip..].iter().copied());
    let design = DMatrix::from_fn(rows, lag + 1, |i, j| {
        let t = i + skip;
        if j == 0 { level[t] } else { diff[t - j] }
    });
    ols(&target, &design)
}

/// `ceil(12 * (n/100)^(1/4))`
fn default_max_lag(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

// MacKinnon (1994) tables, two variables, constant term.
const TAU_MAX: f64 = 0.92;
const TAU_MIN: f64 = -18.86;
const TAU_STAR: f64 = -2.62;
const TAU_SMALLP: [f64; 3] = [2.92, 1.5012, 3.9796e-2];
const TAU_LARGEP: [f64; 4] = [2.1945, 6.4695e-1, -2.9198e-1, -4.2377e-2];

/// Approximate p-value of an Engle-Granger statistic for two series.
pub fn mackinnon_p_coint2(stat: f64) -> f64 {
    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let coef: &[f64] = if stat <= TAU_STAR { &TAU_SMALLP } else { &TAU_LARGEP };
    let z = coef.iter().rev().fold(0.0, |acc, c| acc * stat + c);
    Normal::new(0.0, 1.0).map(|n| n.cdf(z)).unwrap_or(f64::NAN)
}
