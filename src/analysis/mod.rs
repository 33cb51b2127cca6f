// src/analysis/mod.rs
//! Pairwise and multivariate relationship scores over normalized series.
//!
//! Scores are quality hints in `[0, 1]`: a p-value `p` maps to
//! `(0.05 - p) / 0.05` when `p < 0.05` and to `0` otherwise.

pub mod coint;
pub mod granger;
pub mod ols;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

pub use coint::CointResult;
pub use granger::LagResult;

use crate::normalize::NormalizedDataset;

pub const SIGNIFICANCE: f64 = 0.05;

pub fn score(p: f64) -> f64 {
    if p.is_nan() || p >= SIGNIFICANCE {
        0.0
    } else {
        (SIGNIFICANCE - p) / SIGNIFICANCE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrangerReport {
    /// Mean over every lag and every test statistic.
    pub mean_p: f64,
    pub score: f64,
    pub lags: Vec<LagResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CointReport {
    pub score: f64,
    pub result: Option<CointResult>,
}

/// Two aligned series.
pub struct PairwiseAnalyzer<'a> {
    xt: &'a [f64],
    yt: &'a [f64],
}

impl<'a> PairwiseAnalyzer<'a> {
    pub fn new(xt: &'a [f64], yt: &'a [f64]) -> Self {
        let n = xt.len().min(yt.len());
        Self {
            xt: &xt[..n],
            yt: &yt[..n],
        }
    }

    /// Whether `xt` helps forecast `yt`, with the per-lag p-values.
    pub fn granger_report(&self) -> GrangerReport {
        let lags: Vec<LagResult> = granger::lag_grid(self.yt.len())
            .into_iter()
            .filter_map(|lag| granger::test_lag(self.yt, self.xt, lag))
            .collect();
        let all: Vec<f64> = lags
            .iter()
            .flat_map(|l| l.p_values)
            .filter(|p| p.is_finite())
            .collect();
        let mean_p = if all.is_empty() {
            f64::NAN
        } else {
            all.iter().sum::<f64>() / all.len() as f64
        };
        GrangerReport {
            mean_p,
            score: score(mean_p),
            lags,
        }
    }

    pub fn grangercausality(&self) -> f64 {
        self.granger_report().score
    }

    pub fn cointegration_report(&self) -> CointReport {
        let result = coint::engle_granger(self.yt, self.xt);
        CointReport {
            score: result.as_ref().map_or(0.0, |r| score(r.p_value)),
            result,
        }
    }

    pub fn cointegration(&self) -> f64 {
        self.cointegration_report().score
    }
}

/// Named, equally long series.
pub struct MultivariateAnalyzer {
    series: BTreeMap<String, Vec<f64>>,
}

impl MultivariateAnalyzer {
    pub fn new(series: BTreeMap<String, Vec<f64>>) -> Self {
        Self { series }
    }

    /// Directional: `(cause, effect) → score` over ordered pairs.
    pub fn grangercausality(&self) -> BTreeMap<(String, String), f64> {
        let mut out = BTreeMap::new();
        for (a, xa) in &self.series {
            for (b, xb) in &self.series {
                if a == b {
                    continue;
                }
                let s = PairwiseAnalyzer::new(xa, xb).grangercausality();
                if s > 0.0 {
                    out.insert((a.clone(), b.clone()), s);
                }
            }
        }
        out
    }

    /// Symmetric: one entry per unordered pair, keyed in name order.
    pub fn cointegration(&self) -> BTreeMap<(String, String), f64> {
        let names: Vec<&String> = self.series.keys().collect();
        let mut out = BTreeMap::new();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                let s = PairwiseAnalyzer::new(&self.series[*a], &self.series[*b]).cointegration();
                if s > 0.0 {
                    out.insert(((*a).clone(), (*b).clone()), s);
                }
            }
        }
        out
    }
}

/// Cut every dataset to the days all of them cover and return their scaled
/// values by name. Empty when the axes do not overlap.
pub fn align(datasets: &[(String, NormalizedDataset)]) -> BTreeMap<String, Vec<f64>> {
    let start: Option<NaiveDate> = datasets.iter().filter_map(|(_, d)| d.t.first().copied()).max();
    let end: Option<NaiveDate> = datasets.iter().filter_map(|(_, d)| d.t.last().copied()).min();
    let (Some(start), Some(end)) = (start, end) else {
        return BTreeMap::new();
    };
    if start > end || datasets.iter().any(|(_, d)| d.is_empty()) {
        return BTreeMap::new();
    }
    let days = (end - start).num_days() as usize + 1;
    datasets
        .iter()
        .map(|(name, d)| {
            let offset = (start - d.t[0]).num_days() as usize;
            (name.clone(), d.daily[offset..offset + days].to_vec())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolate::Method;
    use crate::normalize::{standardize, Provenance, RawPoint};

    #[test]
    fn score_transform() {
        assert_eq!(score(0.05), 0.0);
        assert_eq!(score(0.2), 0.0);
        assert_eq!(score(0.0), 1.0);
        assert!((score(0.025) - 0.5).abs() < 1e-12);
        assert_eq!(score(f64::NAN), 0.0);
    }

    fn ds(start: u32, end: u32) -> NormalizedDataset {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        standardize(
            &[RawPoint::new(d(start), Some(0.0)), RawPoint::new(d(end), Some(1.0))],
            Provenance {
                source: "t".into(),
                element: "E".into(),
                factor: "f".into(),
                collected: d(31),
            },
            Method::Pchip,
        )
        .unwrap()
    }

    #[test]
    fn align_intersects_axes() {
        let aligned = align(&[("a".into(), ds(1, 10)), ("b".into(), ds(5, 20))]);
        assert_eq!(aligned["a"].len(), 6);
        assert_eq!(aligned["b"].len(), 6);
        assert_eq!(aligned["b"][0], 0.0);
        assert!(align(&[("a".into(), ds(1, 3)), ("b".into(), ds(5, 9))]).is_empty());
    }

    #[test]
    fn multivariate_omits_zero_scores() {
        let mut seed: u64 = 5;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 11) as f64 / (1u64 << 53) as f64) - 0.5
        };
        let x: Vec<f64> = (0..200).map(|_| next()).collect();
        let mut y = vec![0.0; 200];
        for t in 1..200 {
            y[t] = 0.9 * x[t - 1] + 0.05 * next();
        }
        let m = MultivariateAnalyzer::new(BTreeMap::from([("x".to_string(), x), ("y".to_string(), y)]));
        let g = m.grangercausality();
        assert!(g.get(&("x".to_string(), "y".to_string())).is_some_and(|s| *s > 0.9));
        assert!(g.values().all(|s| *s > 0.0));
        assert!(m.cointegration().values().all(|s| *s > 0.0));
    }
}
