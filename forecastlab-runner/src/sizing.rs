//! Kelly-criterion position sizing with drift-aware haircuts.
//!
//! Sizing is the last stage of the pipeline: it consumes the win statistics
//! produced by a backtest and the current drift verdict, and returns a
//! bounded fraction of capital plus concrete stop/take prices. The hard cap
//! always wins — no statistical edge overrides it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::drift::{DriftState, DriftStatus};

/// Sizing parameters. Defaults follow the reference risk policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fraction of full Kelly actually deployed.
    pub fractional_kelly: f64,
    /// Absolute ceiling on the risked fraction of capital.
    pub hard_cap_pct: f64,
    /// Stop-loss offset below the entry price.
    pub stop_loss_pct: f64,
    /// Take-profit offset above the entry price.
    pub take_profit_pct: f64,
    /// Multiplier applied to the fractional Kelly under CRITICAL drift.
    pub critical_haircut: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            fractional_kelly: 0.25,
            hard_cap_pct: 0.062,
            stop_loss_pct: 0.15,
            take_profit_pct: 0.30,
            critical_haircut: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("invalid sizing input: {reason}")]
    InvalidInput { reason: String },
}

/// A fully resolved sizing recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingDecision {
    /// Account capital the decision was computed against.
    pub capital_base: f64,
    /// Raw textbook Kelly fraction; negative when there is no edge.
    pub kelly_fraction: f64,
    /// Final fraction of capital to risk after scaling, haircut, and cap.
    pub risk_fraction: f64,
    /// Capital committed: `capital * risk_fraction`.
    pub position_value: f64,
    /// Position size in (fractional) shares at the entry price.
    pub shares: f64,
    /// Whether the hard cap bound the result.
    pub capped: bool,
    /// Whether the CRITICAL-drift haircut was applied.
    pub drift_haircut_applied: bool,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
}

/// Compute a position size from win statistics and the drift verdict.
///
/// Kelly fraction is `win_rate - (1 - win_rate) / win_loss_ratio`. A
/// non-positive Kelly means no edge: the decision carries a zero position
/// rather than an error. Under CRITICAL drift the fractional multiplier is
/// cut by `critical_haircut` before the cap is applied.
pub fn size(
    capital: f64,
    entry_price: f64,
    win_rate: f64,
    win_loss_ratio: f64,
    drift: &DriftState,
    config: &SizingConfig,
) -> Result<SizingDecision, SizingError> {
    validate_inputs(capital, entry_price, win_rate, win_loss_ratio, config)?;

    let stop_loss_price = entry_price * (1.0 - config.stop_loss_pct);
    let take_profit_price = entry_price * (1.0 + config.take_profit_pct);

    let kelly_fraction = win_rate - (1.0 - win_rate) / win_loss_ratio;
    if kelly_fraction <= 0.0 {
        return Ok(SizingDecision {
            capital_base: capital,
            kelly_fraction,
            risk_fraction: 0.0,
            position_value: 0.0,
            shares: 0.0,
            capped: false,
            drift_haircut_applied: false,
            stop_loss_price,
            take_profit_price,
        });
    }

    let mut effective_fraction = config.fractional_kelly;
    let drift_haircut_applied = drift.status == DriftStatus::Critical;
    if drift_haircut_applied {
        effective_fraction *= config.critical_haircut;
        warn!(
            status = %drift.status,
            haircut = config.critical_haircut,
            "critical drift: cutting fractional Kelly"
        );
    }

    let scaled = kelly_fraction * effective_fraction;
    let capped = scaled > config.hard_cap_pct;
    let risk_fraction = scaled.min(config.hard_cap_pct);
    let position_value = capital * risk_fraction;

    Ok(SizingDecision {
        capital_base: capital,
        kelly_fraction,
        risk_fraction,
        position_value,
        shares: position_value / entry_price,
        capped,
        drift_haircut_applied,
        stop_loss_price,
        take_profit_price,
    })
}

fn validate_inputs(
    capital: f64,
    entry_price: f64,
    win_rate: f64,
    win_loss_ratio: f64,
    config: &SizingConfig,
) -> Result<(), SizingError> {
    let fail = |reason: String| Err(SizingError::InvalidInput { reason });
    if !capital.is_finite() || capital <= 0.0 {
        return fail(format!("capital must be positive, got {capital}"));
    }
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return fail(format!("entry_price must be positive, got {entry_price}"));
    }
    if !win_rate.is_finite() || !(0.0..=1.0).contains(&win_rate) {
        return fail(format!("win_rate must be in [0, 1], got {win_rate}"));
    }
    if !win_loss_ratio.is_finite() || win_loss_ratio <= 0.0 {
        return fail(format!(
            "win_loss_ratio must be positive, got {win_loss_ratio}"
        ));
    }
    if !config.fractional_kelly.is_finite()
        || config.fractional_kelly <= 0.0
        || config.fractional_kelly > 1.0
    {
        return fail(format!(
            "fractional_kelly must be in (0, 1], got {}",
            config.fractional_kelly
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn drift_state(status: DriftStatus) -> DriftState {
        DriftState {
            status,
            ks: None,
            rolling_accuracy: None,
            accuracy_breach_streak: 0,
            stability_score: 50.0,
            retrain_recommended: false,
            baseline_samples: 0,
            recent_samples: 0,
            last_evaluated_at: Utc::now(),
        }
    }

    // ── Kelly arithmetic ──

    #[test]
    fn kelly_formula() {
        let d = size(
            100_000.0,
            50.0,
            0.6,
            2.0,
            &drift_state(DriftStatus::Stable),
            &SizingConfig::default(),
        )
        .unwrap();
        // f* = 0.6 - 0.4/2.0 = 0.4
        assert!((d.kelly_fraction - 0.4).abs() < 1e-12);
    }

    #[test]
    fn hard_cap_binds_strong_edge() {
        // 0.4 * 0.25 = 0.10 > 0.062 → the cap wins.
        let d = size(
            100_000.0,
            50.0,
            0.6,
            2.0,
            &drift_state(DriftStatus::Stable),
            &SizingConfig::default(),
        )
        .unwrap();
        assert!((d.risk_fraction - 0.062).abs() < 1e-12);
        assert!(d.capped);
        assert!(!d.drift_haircut_applied);
        assert_eq!(d.capital_base, 100_000.0);
        assert!((d.position_value - 6_200.0).abs() < 1e-9);
        assert!((d.shares - 124.0).abs() < 1e-9);
    }

    #[test]
    fn weak_edge_stays_below_cap() {
        // f* = 0.52 - 0.48/1.1 ≈ 0.0836 → 0.25x ≈ 0.0209
        let d = size(
            100_000.0,
            50.0,
            0.52,
            1.1,
            &drift_state(DriftStatus::Stable),
            &SizingConfig::default(),
        )
        .unwrap();
        assert!(!d.capped);
        let expected = (0.52 - 0.48 / 1.1) * 0.25;
        assert!((d.risk_fraction - expected).abs() < 1e-12);
    }

    #[test]
    fn no_edge_means_zero_position() {
        let d = size(
            100_000.0,
            50.0,
            0.4,
            1.0,
            &drift_state(DriftStatus::Stable),
            &SizingConfig::default(),
        )
        .unwrap();
        assert!(d.kelly_fraction < 0.0);
        assert_eq!(d.risk_fraction, 0.0);
        assert_eq!(d.position_value, 0.0);
        assert_eq!(d.shares, 0.0);
        assert!(!d.capped);
        // Stop and take are still concrete prices.
        assert!((d.stop_loss_price - 42.5).abs() < 1e-12);
        assert!((d.take_profit_price - 65.0).abs() < 1e-12);
    }

    #[test]
    fn coin_flip_even_odds_is_breakeven() {
        let d = size(
            100_000.0,
            50.0,
            0.5,
            1.0,
            &drift_state(DriftStatus::Stable),
            &SizingConfig::default(),
        )
        .unwrap();
        assert_eq!(d.risk_fraction, 0.0);
    }

    // ── Drift haircut ──

    #[test]
    fn critical_drift_halves_fraction() {
        // 0.4 * 0.25 * 0.5 = 0.05 < 0.062 → no longer capped.
        let d = size(
            100_000.0,
            50.0,
            0.6,
            2.0,
            &drift_state(DriftStatus::Critical),
            &SizingConfig::default(),
        )
        .unwrap();
        assert!(d.drift_haircut_applied);
        assert!(!d.capped);
        assert!((d.risk_fraction - 0.05).abs() < 1e-12);
    }

    #[test]
    fn cap_still_binds_after_haircut() {
        // f* = 0.9 - 0.1/5 = 0.88 → 0.88 * 0.125 = 0.11 > 0.062.
        let d = size(
            100_000.0,
            50.0,
            0.9,
            5.0,
            &drift_state(DriftStatus::Critical),
            &SizingConfig::default(),
        )
        .unwrap();
        assert!(d.drift_haircut_applied);
        assert!(d.capped);
        assert!((d.risk_fraction - 0.062).abs() < 1e-12);
    }

    #[test]
    fn warning_and_insufficient_take_no_haircut() {
        for status in [DriftStatus::Warning, DriftStatus::Insufficient, DriftStatus::Stable] {
            let d = size(
                100_000.0,
                50.0,
                0.6,
                2.0,
                &drift_state(status),
                &SizingConfig::default(),
            )
            .unwrap();
            assert!(!d.drift_haircut_applied, "status {status}");
            assert!((d.risk_fraction - 0.062).abs() < 1e-12);
        }
    }

    // ── Stop / take ──

    #[test]
    fn stop_and_take_offsets() {
        let d = size(
            100_000.0,
            200.0,
            0.6,
            2.0,
            &drift_state(DriftStatus::Stable),
            &SizingConfig::default(),
        )
        .unwrap();
        assert!((d.stop_loss_price - 170.0).abs() < 1e-9);
        assert!((d.take_profit_price - 260.0).abs() < 1e-9);
    }

    // ── Input validation ──

    #[test]
    fn rejects_bad_inputs() {
        let stable = drift_state(DriftStatus::Stable);
        let cfg = SizingConfig::default();
        assert!(size(0.0, 50.0, 0.6, 2.0, &stable, &cfg).is_err());
        assert!(size(-1.0, 50.0, 0.6, 2.0, &stable, &cfg).is_err());
        assert!(size(100_000.0, 0.0, 0.6, 2.0, &stable, &cfg).is_err());
        assert!(size(100_000.0, 50.0, 1.5, 2.0, &stable, &cfg).is_err());
        assert!(size(100_000.0, 50.0, -0.1, 2.0, &stable, &cfg).is_err());
        assert!(size(100_000.0, 50.0, 0.6, 0.0, &stable, &cfg).is_err());
        assert!(size(100_000.0, 50.0, 0.6, -2.0, &stable, &cfg).is_err());
        assert!(size(f64::NAN, 50.0, 0.6, 2.0, &stable, &cfg).is_err());
    }

    #[test]
    fn rejects_bad_fractional_kelly() {
        let stable = drift_state(DriftStatus::Stable);
        let mut cfg = SizingConfig::default();
        cfg.fractional_kelly = 0.0;
        assert!(size(100_000.0, 50.0, 0.6, 2.0, &stable, &cfg).is_err());
        cfg.fractional_kelly = 1.5;
        assert!(size(100_000.0, 50.0, 0.6, 2.0, &stable, &cfg).is_err());
        cfg.fractional_kelly = 1.0;
        assert!(size(100_000.0, 50.0, 0.6, 2.0, &stable, &cfg).is_ok());
    }

    #[test]
    fn certain_win_is_fully_capped() {
        let d = size(
            100_000.0,
            50.0,
            1.0,
            2.0,
            &drift_state(DriftStatus::Stable),
            &SizingConfig::default(),
        )
        .unwrap();
        assert!((d.kelly_fraction - 1.0).abs() < 1e-12);
        assert!(d.capped);
        assert!((d.risk_fraction - 0.062).abs() < 1e-12);
    }
}
