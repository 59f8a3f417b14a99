//! Realized volatility — the regime feature consumed by the combiner.

/// Rolling realized volatility: sample standard deviation of the last
/// `window` one-step simple returns.
///
/// Returns `None` when the slice holds fewer than `window + 1` closes, so
/// callers fall back to static weights instead of tilting on a noisy or
/// undefined estimate. A genuinely flat tape yields `Some(0.0)`.
pub fn realized_volatility(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window + 1 {
        return None;
    }
    let tail = &closes[closes.len() - (window + 1)..];
    let returns: Vec<f64> = tail.windows(2).map(|w| w[1] / w[0] - 1.0).collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let vol = var.sqrt();
    vol.is_finite().then_some(vol)
}
