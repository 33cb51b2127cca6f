// tests/normalize_props.rs
//
// Property checks for the normalizer over arbitrary raw series.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use econ_data_service::interpolate::Method;
use econ_data_service::normalize::{clean, destandardize, standardize, Provenance, RawPoint};

fn provenance() -> Provenance {
    Provenance {
        source: "prop".into(),
        element: "X".into(),
        factor: "g.f".into(),
        collected: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    }
}

fn raw_series() -> impl Strategy<Value = Vec<RawPoint>> {
    let base = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    prop::collection::vec(
        (0u64..400, prop::option::weighted(0.85, -1.0e6f64..1.0e6)),
        0..40,
    )
    .prop_map(move |pts| {
        pts.into_iter()
            .map(|(d, v)| RawPoint::new(base.checked_add_days(Days::new(d)).unwrap(), v))
            .collect()
    })
}

proptest! {
    #[test]
    fn dense_axis_and_unit_range(raw in raw_series(), akima in any::<bool>()) {
        let method = if akima { Method::Akima } else { Method::Pchip };
        let cleaned = clean(&raw);
        match standardize(&raw, provenance(), method) {
            None => prop_assert!(cleaned.len() < 2),
            Some(ds) => {
                prop_assert_eq!(ds.daily.len(), ds.t.len());
                prop_assert_eq!(ds.mask.len(), ds.t.len());
                prop_assert!(ds.t.windows(2).all(|w| (w[1] - w[0]).num_days() == 1));
                prop_assert_eq!(ds.t.first(), cleaned.first().map(|(t, _)| t));
                prop_assert_eq!(ds.t.last(), cleaned.last().map(|(t, _)| t));

                let lo = ds.daily.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = ds.daily.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let s = ds.attrs.scaling;
                if s.origin_min == s.origin_max {
                    prop_assert!(ds.daily.iter().all(|v| *v == 0.5));
                } else {
                    prop_assert!(lo.abs() < 1e-12);
                    prop_assert!((hi - 1.0).abs() < 1e-12);
                }
                prop_assert_eq!(ds.mask.iter().filter(|m| **m).count(), cleaned.len());
            }
        }
    }

    #[test]
    fn observed_days_round_trip(raw in raw_series()) {
        if let Some(ds) = standardize(&raw, provenance(), Method::Pchip) {
            let back = destandardize(&ds);
            let cleaned = clean(&raw);
            prop_assert_eq!(back.len(), cleaned.len());
            let span = ds.attrs.scaling.origin_max - ds.attrs.scaling.origin_min;
            for ((t, x), (et, ex)) in back.iter().zip(&cleaned) {
                prop_assert_eq!(t, et);
                let tol = 1e-9 * ex.abs().max(span).max(1.0);
                prop_assert!((x - ex).abs() <= tol, "{} vs {}", x, ex);
            }
        }
    }

    #[test]
    fn cleaned_input_normalizes_identically(raw in raw_series(), akima in any::<bool>()) {
        let method = if akima { Method::Akima } else { Method::Pchip };
        let dense: Vec<RawPoint> = clean(&raw)
            .into_iter()
            .map(|(t, v)| RawPoint::new(t, Some(v)))
            .collect();
        prop_assert_eq!(
            standardize(&dense, provenance(), method),
            standardize(&raw, provenance(), method)
        );
    }
}
