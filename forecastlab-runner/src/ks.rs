//! Two-sample Kolmogorov–Smirnov test for residual-distribution drift.
//!
//! Implements from first principles:
//! - Two-sample KS statistic via a merged ECDF sweep over both sorted samples
//! - Asymptotic Kolmogorov tail probability Q_KS(lambda) as the alternating
//!   exponential series, with the effective-sample-size correction for the
//!   argument
//!
//! Statistical caveat: residuals from a walk-forward backtest are not i.i.d.
//! draws — autocorrelation and regime overlap inflate the nominal
//! significance. The p-values here feed deterministic drift thresholds and
//! should be read as drift scores, not literal false-positive probabilities.

use serde::{Deserialize, Serialize};

/// Result of a two-sample KS test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsTest {
    /// Maximum vertical distance between the two empirical CDFs, in [0, 1].
    pub statistic: f64,
    /// Asymptotic two-sided p-value, clamped to [0, 1].
    pub p_value: f64,
    /// Size of the first sample.
    pub n1: usize,
    /// Size of the second sample.
    pub n2: usize,
}

/// Two-sample KS test: are `a` and `b` draws from the same distribution?
///
/// Returns `None` when either sample is empty — there is no ECDF to compare.
/// Callers that need a larger floor (the drift detector requires 20 per side)
/// gate on sample size before calling.
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> Option<KsTest> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let mut sa: Vec<f64> = a.to_vec();
    let mut sb: Vec<f64> = b.to_vec();
    sa.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    sb.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));

    let n1 = sa.len();
    let n2 = sb.len();
    let en1 = n1 as f64;
    let en2 = n2 as f64;

    // Merged sweep: advance whichever sample has the smaller next value,
    // tracking the gap between the two step functions.
    let mut j1 = 0usize;
    let mut j2 = 0usize;
    let mut fn1 = 0.0_f64;
    let mut fn2 = 0.0_f64;
    let mut d = 0.0_f64;

    while j1 < n1 && j2 < n2 {
        let d1 = sa[j1];
        let d2 = sb[j2];
        // Runs of duplicates advance as a unit so the gap is only read at
        // genuine ECDF step points.
        if d1 <= d2 {
            while j1 < n1 && sa[j1] == d1 {
                j1 += 1;
            }
            fn1 = j1 as f64 / en1;
        }
        if d2 <= d1 {
            while j2 < n2 && sb[j2] == d2 {
                j2 += 1;
            }
            fn2 = j2 as f64 / en2;
        }
        let dt = (fn2 - fn1).abs();
        if dt > d {
            d = dt;
        }
    }

    // Effective sample size correction for the asymptotic distribution.
    let en = (en1 * en2 / (en1 + en2)).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    let p_value = kolmogorov_tail(lambda).clamp(0.0, 1.0);

    Some(KsTest {
        statistic: d,
        p_value,
        n1,
        n2,
    })
}

/// Kolmogorov distribution tail Q_KS(lambda) = 2 Σ (-1)^(j-1) exp(-2 j² λ²).
///
/// Converges rapidly for lambda above ~0.3; for smaller arguments the series
/// oscillates and the probability is effectively 1.
fn kolmogorov_tail(lambda: f64) -> f64 {
    const EPS_RELATIVE: f64 = 1e-3;
    const EPS_ABSOLUTE: f64 = 1e-8;
    const MAX_TERMS: usize = 100;

    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0_f64;
    let mut sum = 0.0_f64;
    let mut previous_term = 0.0_f64;

    for j in 1..=MAX_TERMS {
        let term = fac * (a2 * (j * j) as f64).exp();
        sum += term;
        if term.abs() <= EPS_RELATIVE * previous_term || term.abs() <= EPS_ABSOLUTE * sum {
            return sum;
        }
        fac = -fac;
        previous_term = term.abs();
    }
    // Series did not converge — the samples are indistinguishable.
    1.0
}
