//! Small statistics helpers shared by the scoring, calibration and forecast crates.
//!
//! Every function is total: degenerate inputs (empty slices, zero variance)
//! return a neutral value or `None` instead of NaN.

use statrs::statistics::Statistics;

/// Mean of a data slice, 0.0 when empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.mean()
}

/// Sample standard deviation, 0.0 below two points.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    data.std_dev()
}

/// Pearson correlation coefficient.
///
/// Returns `None` for mismatched lengths, fewer than two pairs, or a series
/// with no variance (the coefficient is undefined there).
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mx = mean(x);
    let my = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mx;
        let dy = yi - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx < f64::EPSILON || syy < f64::EPSILON {
        return None;
    }

    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Daily log returns of a positive price series (non-positive prices are skipped pairwise).
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Percentage change from `from` to `to`; `None` when `from` is not positive.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if from <= 0.0 || !from.is_finite() || !to.is_finite() {
        return None;
    }
    Some((to - from) / from * 100.0)
}
