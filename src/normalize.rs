//! # Normalizer
//! Turns a raw, unordered series with duplicates and gaps into a dense daily
//! series scaled to `[0, 1]` plus a mask of days that were actually observed.
//!
//! Steps: drop missing → dedup timestamps (first wins) → sort → require two
//! points → interpolate onto every day in `[t0, tN]` → min-max scale →
//! mask observed days. `destandardize` inverts the scaling on masked days.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::interpolate::{Interpolator, Method};

/// One raw observation. `value: None` (or NaN) is a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub t: NaiveDate,
    pub value: Option<f64>,
}

impl RawPoint {
    pub fn new(t: NaiveDate, value: Option<f64>) -> Self {
        Self { t, value }
    }
}

/// Where a series came from and when it was collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub element: String,
    pub factor: String,
    pub collected: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpolation {
    pub method: Method,
    /// Share of daily points that were filled in rather than observed.
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub origin_min: f64,
    pub origin_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetAttrs {
    pub client: Provenance,
    pub interpolation: Interpolation,
    pub scaling: Scaling,
}

/// Dense daily series in `[0, 1]` with its observation mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDataset {
    pub t: Vec<NaiveDate>,
    pub daily: Vec<f64>,
    pub mask: Vec<bool>,
    pub attrs: DatasetAttrs,
}

impl NormalizedDataset {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn collected(&self) -> NaiveDate {
        self.attrs.client.collected
    }

    /// Scaled value on day `t`, if inside the axis.
    pub fn daily_at(&self, t: NaiveDate) -> Option<f64> {
        let first = *self.t.first()?;
        let idx = usize::try_from((t - first).num_days()).ok()?;
        self.daily.get(idx).copied()
    }
}

/// Drop missing, dedup (first present value wins), sort ascending.
pub fn clean(points: &[RawPoint]) -> Vec<(NaiveDate, f64)> {
    let mut seen = HashSet::with_capacity(points.len());
    let mut out: Vec<(NaiveDate, f64)> = points
        .iter()
        .filter_map(|p| match p.value {
            Some(v) if v.is_finite() => Some((p.t, v)),
            _ => None,
        })
        .filter(|(t, _)| seen.insert(*t))
        .collect();
    out.sort_by_key(|(t, _)| *t);
    out
}

/// Normalize a raw series. `None` when fewer than two usable points remain.
pub fn standardize(
    points: &[RawPoint],
    provenance: Provenance,
    method: Method,
) -> Option<NormalizedDataset> {
    let cleaned = clean(points);
    if cleaned.len() < 2 {
        return None;
    }

    let t0 = cleaned[0].0;
    let tn = cleaned[cleaned.len() - 1].0;
    let knots_x: Vec<f64> = cleaned.iter().map(|(t, _)| day_offset(t0, *t)).collect();
    let knots_y: Vec<f64> = cleaned.iter().map(|(_, v)| *v).collect();
    let interp = Interpolator::new(method, &knots_x, &knots_y)?;

    let span = (tn - t0).num_days();
    let t: Vec<NaiveDate> = (0..=span)
        .filter_map(|d| t0.checked_add_days(Days::new(d as u64)))
        .collect();
    let xs: Vec<f64> = (0..=span).map(|d| d as f64).collect();
    let daily_x = interp.eval_many(&xs);

    let origin_min = daily_x.iter().copied().fold(f64::INFINITY, f64::min);
    let origin_max = daily_x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let daily: Vec<f64> = if origin_min == origin_max {
        vec![0.5; daily_x.len()]
    } else {
        let range = origin_max - origin_min;
        daily_x.iter().map(|x| (x - origin_min) / range).collect()
    };

    let observed: HashSet<NaiveDate> = cleaned.iter().map(|(t, _)| *t).collect();
    let mask: Vec<bool> = t.iter().map(|d| observed.contains(d)).collect();
    let filled = mask.iter().filter(|m| !**m).count();
    let ratio = filled as f64 / mask.len() as f64;

    Some(NormalizedDataset {
        t,
        daily,
        mask,
        attrs: DatasetAttrs {
            client: provenance,
            interpolation: Interpolation { method, ratio },
            scaling: Scaling {
                origin_min,
                origin_max,
            },
        },
    })
}

/// Original-unit values on observed days only.
pub fn destandardize(ds: &NormalizedDataset) -> Vec<(NaiveDate, f64)> {
    let Scaling {
        origin_min,
        origin_max,
    } = ds.attrs.scaling;
    let range = origin_max - origin_min;
    ds.t.iter()
        .zip(&ds.daily)
        .zip(&ds.mask)
        .filter(|(_, m)| **m)
        .map(|((t, v), _)| (*t, v * range + origin_min))
        .collect()
}

fn day_offset(t0: NaiveDate, t: NaiveDate) -> f64 {
    (t - t0).num_days() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn missing_duplicate_does_not_shadow_value() {
        let t = d(2024, 1, 3);
        let before = vec![RawPoint::new(t, None), RawPoint::new(t, Some(3.0))];
        let after = vec![RawPoint::new(t, Some(3.0)), RawPoint::new(t, None)];
        assert_eq!(clean(&before), vec![(t, 3.0)]);
        assert_eq!(clean(&after), vec![(t, 3.0)]);

        let nan_first = vec![RawPoint::new(t, Some(f64::NAN)), RawPoint::new(t, Some(4.0))];
        assert_eq!(clean(&nan_first), vec![(t, 4.0)]);
    }

    fn prov() -> Provenance {
        Provenance {
            source: "test".into(),
            element: "AAPL".into(),
            factor: "adj_close".into(),
            collected: d(2024, 5, 1),
        }
    }

    #[test]
    fn dedup_gap_and_mask() {
        let raw = vec![
            RawPoint::new(d(2020, 1, 1), Some(10.0)),
            RawPoint::new(d(2020, 1, 1), Some(10.0)),
            RawPoint::new(d(2020, 1, 3), Some(14.0)),
            RawPoint::new(d(2020, 1, 2), Some(f64::NAN)),
        ];
        let ds = standardize(&raw, prov(), Method::Pchip).unwrap();
        assert_eq!(ds.t, vec![d(2020, 1, 1), d(2020, 1, 2), d(2020, 1, 3)]);
        assert_eq!(ds.mask, vec![true, false, true]);
        assert_eq!(ds.daily[0], 0.0);
        assert_eq!(ds.daily[2], 1.0);
        assert_eq!(ds.attrs.scaling.origin_min, 10.0);
        assert_eq!(ds.attrs.scaling.origin_max, 14.0);
        assert!((ds.attrs.interpolation.ratio - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_is_half() {
        let raw: Vec<RawPoint> = (1..=3)
            .map(|i| RawPoint::new(d(2021, 3, i), Some(5.0)))
            .collect();
        let ds = standardize(&raw, prov(), Method::Pchip).unwrap();
        assert_eq!(ds.daily, vec![0.5, 0.5, 0.5]);
        assert_eq!(ds.attrs.scaling.origin_min, 5.0);
        assert_eq!(ds.attrs.scaling.origin_max, 5.0);
        assert_eq!(destandardize(&ds), vec![(d(2021, 3, 1), 5.0), (d(2021, 3, 2), 5.0), (d(2021, 3, 3), 5.0)]);
    }

    #[test]
    fn single_point_declines() {
        let raw = vec![
            RawPoint::new(d(2020, 1, 1), Some(1.0)),
            RawPoint::new(d(2020, 1, 2), None),
        ];
        assert!(standardize(&raw, prov(), Method::Pchip).is_none());
        assert!(standardize(&[], prov(), Method::Akima).is_none());
    }

    #[test]
    fn first_present_duplicate_wins() {
        let raw = vec![
            RawPoint::new(d(2020, 1, 5), Some(4.0)),
            RawPoint::new(d(2020, 1, 1), None),
            RawPoint::new(d(2020, 1, 1), Some(3.0)),
            RawPoint::new(d(2020, 1, 1), Some(9.0)),
        ];
        assert_eq!(clean(&raw), vec![(d(2020, 1, 1), 3.0), (d(2020, 1, 5), 4.0)]);
    }

    #[test]
    fn yearly_series_round_trips() {
        let raw: Vec<RawPoint> = [(2000, 3.2), (2001, 7.9), (2003, -1.5), (2002, 4.4)]
            .iter()
            .map(|(y, v)| RawPoint::new(d(*y, 1, 1), Some(*v)))
            .collect();
        let ds = standardize(&raw, prov(), Method::Akima).unwrap();
        assert_eq!(ds.len(), ds.daily.len());
        assert_eq!(ds.len() as i64, (d(2003, 1, 1) - d(2000, 1, 1)).num_days() + 1);
        let back = destandardize(&ds);
        assert_eq!(back.len(), 4);
        for (t, v) in back {
            let orig = raw.iter().find(|p| p.t == t).unwrap().value.unwrap();
            assert!((v - orig).abs() <= 1e-9 * orig.abs().max(1.0));
        }
    }

    #[test]
    fn daily_at_indexes_by_day() {
        let raw = vec![
            RawPoint::new(d(2020, 1, 1), Some(0.0)),
            RawPoint::new(d(2020, 1, 11), Some(10.0)),
        ];
        let ds = standardize(&raw, prov(), Method::Pchip).unwrap();
        assert!((ds.daily_at(d(2020, 1, 6)).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(ds.daily_at(d(2019, 12, 31)), None);
        assert_eq!(ds.daily_at(d(2020, 1, 12)), None);
    }
}
