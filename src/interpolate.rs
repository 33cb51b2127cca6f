//! Shape-preserving piecewise-cubic interpolation.
//!
//! Both methods build Hermite cubics on the given knots and differ only in
//! how knot slopes are chosen:
//! - `Pchip`: Fritsch–Carlson weighted harmonic mean, monotone-preserving.
//! - `Akima`: Akima (1970) local slopes, less overshoot near outliers.
//!
//! Evaluation at a knot returns the knot value exactly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Pchip,
    Akima,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Pchip => "pchip",
            Method::Akima => "akima",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Interpolator {
    x: Vec<f64>,
    y: Vec<f64>,
    d: Vec<f64>,
}

impl Interpolator {
    /// `x` must be strictly increasing with at least two knots.
    pub fn new(method: Method, x: &[f64], y: &[f64]) -> Option<Self> {
        if x.len() < 2 || x.len() != y.len() {
            return None;
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) || y.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let d = match method {
            Method::Pchip => pchip_slopes(x, y),
            Method::Akima => akima_slopes(x, y),
        };
        Some(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            d,
        })
    }

    /// Evaluate at `t`. Outside the knot range the end cubic is extended.
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.x.len();
        let k = match self.x.binary_search_by(|v| v.total_cmp(&t)) {
            Ok(i) => return self.y[i],
            Err(0) => 0,
            Err(i) if i >= n => n - 2,
            Err(i) => i - 1,
        };
        let h = self.x[k + 1] - self.x[k];
        let s = (t - self.x[k]) / h;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        h00 * self.y[k] + h10 * h * self.d[k] + h01 * self.y[k + 1] + h11 * h * self.d[k + 1]
    }

    pub fn eval_many(&self, ts: &[f64]) -> Vec<f64> {
        ts.iter().map(|&t| self.eval(t)).collect()
    }
}

fn secants(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let m: Vec<f64> = y
        .windows(2)
        .zip(&h)
        .map(|(w, hk)| (w[1] - w[0]) / hk)
        .collect();
    (h, m)
}

fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let (h, m) = secants(x, y);
    if n == 2 {
        return vec![m[0], m[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if m[k - 1] * m[k] <= 0.0 {
            d[k] = 0.0;
        } else {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / m[k - 1] + w2 / m[k]);
        }
    }
    d[0] = pchip_end_slope(h[0], h[1], m[0], m[1]);
    d[n - 1] = pchip_end_slope(h[n - 2], h[n - 3], m[n - 2], m[n - 3]);
    d
}

/// One-sided three-point end slope, clipped to keep the shape.
fn pchip_end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if sign(d) != sign(m0) {
        0.0
    } else if sign(m0) != sign(m1) && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

// Unlike `f64::signum`, zero maps to zero.
fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

fn akima_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let (_, m) = secants(x, y);
    if n == 2 {
        return vec![m[0], m[0]];
    }

    // Extend the secants by two on each side with linear extrapolation.
    let mut ext = Vec::with_capacity(m.len() + 4);
    let (m0, m1) = (m[0], m[1]);
    let (ml, ml1) = (m[m.len() - 1], m[m.len() - 2]);
    ext.push(3.0 * m0 - 2.0 * m1);
    ext.push(2.0 * m0 - m1);
    ext.extend_from_slice(&m);
    ext.push(2.0 * ml - ml1);
    ext.push(3.0 * ml - 2.0 * ml1);

    let mut d = vec![0.0; n];
    for (i, di) in d.iter_mut().enumerate() {
        // ext[i + 2] is the secant right of knot i; ext[i + 1] the one left of it.
        let w1 = (ext[i + 3] - ext[i + 2]).abs();
        let w2 = (ext[i + 1] - ext[i]).abs();
        *di = if w1 + w2 <= f64::EPSILON * (ext[i + 1].abs() + ext[i + 2].abs()).max(1.0) {
            0.5 * (ext[i + 1] + ext[i + 2])
        } else {
            (w1 * ext[i + 1] + w2 * ext[i + 2]) / (w1 + w2)
        };
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn hits_knots_exactly() {
        let x = [0.0, 1.0, 3.0, 4.0];
        let y = [1.0, 5.0, 2.0, 2.5];
        for method in [Method::Pchip, Method::Akima] {
            let f = Interpolator::new(method, &x, &y).unwrap();
            for (xi, yi) in x.iter().zip(&y) {
                assert_eq!(f.eval(*xi), *yi);
            }
        }
    }

    #[test]
    fn two_points_are_linear() {
        let f = Interpolator::new(Method::Pchip, &[0.0, 2.0], &[10.0, 14.0]).unwrap();
        assert_close(f.eval(1.0), 12.0);
        let g = Interpolator::new(Method::Akima, &[0.0, 2.0], &[10.0, 14.0]).unwrap();
        assert_close(g.eval(0.5), 11.0);
    }

    #[test]
    fn pchip_preserves_monotonicity() {
        let x = [0.0, 1.0, 2.0, 3.0, 10.0];
        let y = [0.0, 0.1, 5.0, 5.1, 6.0];
        let f = Interpolator::new(Method::Pchip, &x, &y).unwrap();
        let mut prev = f64::NEG_INFINITY;
        for i in 0..=1000 {
            let v = f.eval(i as f64 / 100.0);
            assert!(v >= prev - 1e-12);
            prev = v;
        }
    }

    #[test]
    fn pchip_flat_segments_stay_flat() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 2.0, 2.0, 1.0];
        let f = Interpolator::new(Method::Pchip, &x, &y).unwrap();
        assert_close(f.eval(1.5), 2.0);
    }

    #[test]
    fn akima_reproduces_lines() {
        let x = [0.0, 1.0, 2.5, 4.0, 7.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let f = Interpolator::new(Method::Akima, &x, &y).unwrap();
        assert_close(f.eval(3.3), 7.6);
    }

    #[test]
    fn rejects_bad_knots() {
        assert!(Interpolator::new(Method::Pchip, &[0.0], &[1.0]).is_none());
        assert!(Interpolator::new(Method::Pchip, &[0.0, 0.0], &[1.0, 2.0]).is_none());
        assert!(Interpolator::new(Method::Pchip, &[0.0, 1.0], &[1.0, f64::NAN]).is_none());
    }
}
