use serde::{Deserialize, Serialize};

use crate::correction::error::{CorrectionError, fit_error};

/// Least-squares parabola `a*x^2 + b*x + c` through scan samples, with the
/// amplitude the scan should settle on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParabolaFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub optimum: f64,
    pub optimum_value: f64,
    /// The optimum sits on the first or last scanned amplitude.
    pub on_boundary: bool,
}

impl ParabolaFit {
    pub fn predict(&self, x: f64) -> f64 {
        (self.a * x + self.b) * x + self.c
    }

    pub fn is_convex(&self) -> bool {
        self.a > 0.0
    }
}

/// Fits `(amplitude, value)` samples.
///
/// A convex fit settles on its vertex, clamped to the scanned range. Any other
/// fit settles on the best sample.
pub fn fit_parabola(points: &[(f64, f64)]) -> Result<ParabolaFit, CorrectionError> {
    if points.len() < 3 {
        return Err(fit_error(format!(
            "a parabola needs at least 3 points, got {}",
            points.len()
        )));
    }
    if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(fit_error("scan samples must be finite"));
    }

    let mut xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    if xs.len() < 3 {
        return Err(fit_error(format!(
            "a parabola needs 3 distinct amplitudes, got {}",
            xs.len()
        )));
    }
    let lo = xs[0];
    let hi = xs[xs.len() - 1];

    // Work in u = (x - mid) / half so the normal equations stay well scaled.
    let mid = 0.5 * (lo + hi);
    let half = 0.5 * (hi - lo);
    let mut sums = [0.0_f64; 5];
    let mut moments = [0.0_f64; 3];
    for (x, y) in points {
        let u = (x - mid) / half;
        let mut power = 1.0;
        for (k, sum) in sums.iter_mut().enumerate() {
            *sum += power;
            if k < 3 {
                moments[k] += power * y;
            }
            power *= u;
        }
    }

    let system = [
        [sums[0], sums[1], sums[2], moments[0]],
        [sums[1], sums[2], sums[3], moments[1]],
        [sums[2], sums[3], sums[4], moments[2]],
    ];
    let [cu, bu, au] =
        solve3(system).ok_or_else(|| fit_error("the scan samples give a singular fit"))?;

    // Back to x: y = au*u^2 + bu*u + cu with u = (x - mid) / half.
    let a = au / (half * half);
    let b_mid = bu / half;
    let b = b_mid - 2.0 * a * mid;
    let c = a * mid * mid - b_mid * mid + cu;

    let mut fit = ParabolaFit {
        a,
        b,
        c,
        optimum: 0.0,
        optimum_value: 0.0,
        on_boundary: false,
    };

    if fit.is_convex() {
        let vertex = -b / (2.0 * a);
        let optimum = vertex.clamp(lo, hi);
        fit.optimum = optimum;
        fit.optimum_value = fit.predict(optimum);
        fit.on_boundary = optimum <= lo || optimum >= hi;
    } else {
        let (x, y) = points
            .iter()
            .copied()
            .min_by(|left, right| left.1.total_cmp(&right.1))
            .ok_or_else(|| fit_error("no scan samples"))?;
        fit.optimum = x;
        fit.optimum_value = y;
        fit.on_boundary = x <= lo || x >= hi;
    }
    Ok(fit)
}

/// Gauss-Jordan elimination with partial pivoting on an augmented 3x3 system.
fn solve3(mut m: [[f64; 4]; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        for row in 0..3 {
            if row == col {
                continue;
            }
            let factor = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }
    Some([m[0][3] / m[0][0], m[1][3] / m[1][1], m[2][3] / m[2][2]])
}
