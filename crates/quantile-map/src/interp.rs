//! One-dimensional factor curves with nearest, linear and natural cubic
//! spline interpolation.

use crate::config::{Extrapolation, Interpolation};

/// Interpolant through `(x, y)` knots with a fixed out-of-range rule.
#[derive(Debug, Clone)]
pub(crate) struct FactorCurve {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots (cubic only).
    second: Vec<f64>,
    interpolation: Interpolation,
    extrapolation: Extrapolation,
}

impl FactorCurve {
    /// Builds a curve from knots sorted by `x`.
    ///
    /// Non-finite knots are dropped. Runs of equal `x` collapse to one knot
    /// holding the mean of their `y` values.
    pub(crate) fn new(
        xs: &[f64],
        ys: &[f64],
        interpolation: Interpolation,
        extrapolation: Extrapolation,
    ) -> Self {
        let mut kx: Vec<f64> = Vec::with_capacity(xs.len());
        let mut ky: Vec<f64> = Vec::with_capacity(xs.len());
        let mut run = 0usize;
        for (&x, &y) in xs.iter().zip(ys) {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            match kx.last() {
                Some(&last) if last == x => {
                    run += 1;
                    if let Some(acc) = ky.last_mut() {
                        *acc += (y - *acc) / run as f64;
                    }
                }
                _ => {
                    kx.push(x);
                    ky.push(y);
                    run = 1;
                }
            }
        }

        let second = match interpolation {
            Interpolation::Cubic => natural_spline_second_derivatives(&kx, &ky),
            _ => Vec::new(),
        };

        Self {
            xs: kx,
            ys: ky,
            second,
            interpolation,
            extrapolation,
        }
    }

    /// `true` if `x` lies outside the knot range.
    pub(crate) fn is_outside(&self, x: f64) -> bool {
        match (self.xs.first(), self.xs.last()) {
            (Some(&lo), Some(&hi)) => x < lo || x > hi,
            _ => true,
        }
    }

    /// Evaluates the curve at `x`. Returns `NaN` for `NaN` input, for an
    /// empty curve, and for out-of-range `x` under [`Extrapolation::Nan`].
    pub(crate) fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if n == 0 || x.is_nan() {
            return f64::NAN;
        }
        if x < self.xs[0] || x > self.xs[n - 1] {
            return match self.extrapolation {
                Extrapolation::Nan => f64::NAN,
                Extrapolation::Constant if x < self.xs[0] => self.ys[0],
                Extrapolation::Constant => self.ys[n - 1],
            };
        }
        if n == 1 {
            return self.ys[0];
        }

        // xs[j] <= x <= xs[j + 1]
        let j = self.xs.partition_point(|&k| k <= x).clamp(1, n - 1) - 1;
        let (x0, x1) = (self.xs[j], self.xs[j + 1]);
        let (y0, y1) = (self.ys[j], self.ys[j + 1]);
        let h = x1 - x0;

        match self.interpolation {
            Interpolation::Nearest => {
                if x - x0 <= x1 - x {
                    y0
                } else {
                    y1
                }
            }
            Interpolation::Linear => y0 + (x - x0) / h * (y1 - y0),
            Interpolation::Cubic => {
                let (m0, m1) = (self.second[j], self.second[j + 1]);
                let a = x1 - x;
                let b = x - x0;
                m0 * a.powi(3) / (6.0 * h)
                    + m1 * b.powi(3) / (6.0 * h)
                    + (y0 - m0 * h * h / 6.0) * a / h
                    + (y1 - m1 * h * h / 6.0) * b / h
            }
        }
    }
}

/// Second derivatives of the natural cubic spline through `(xs, ys)`.
///
/// Solves the tridiagonal system for the interior knots with the Thomas
/// algorithm; both end values are zero.
fn natural_spline_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let interior = n - 2;
    let mut diag = vec![0.0; interior];
    let mut upper = vec![0.0; interior];
    let mut rhs = vec![0.0; interior];

    for k in 0..interior {
        let i = k + 1;
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        upper[k] = h[i];
        rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
    }

    // Forward sweep; the sub-diagonal of row k is h[k].
    for k in 1..interior {
        let w = h[k] / diag[k - 1];
        diag[k] -= w * upper[k - 1];
        rhs[k] -= w * rhs[k - 1];
    }

    // Back substitution
    m[interior] = rhs[interior - 1] / diag[interior - 1];
    for k in (0..interior - 1).rev() {
        m[k + 1] = (rhs[k] - upper[k] * m[k + 2]) / diag[k];
    }
    m
}
