//! Forecast-quality and simulation metrics — pure functions.
//!
//! Every metric is a pure function: predicted/actual slices, equity curves,
//! or per-trade P/L lists in, scalar out. No dependencies on the backtester,
//! data pipeline, or drift detector.

/// Mean absolute error between predicted and realized closes.
///
/// Pairs beyond the shorter slice are ignored. Returns 0.0 on empty input.
pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).abs())
        .sum();
    sum / n as f64
}

/// Root mean squared error between predicted and realized closes.
///
/// Penalizes large misses harder than MAE. Returns 0.0 on empty input.
pub fn root_mean_squared_error(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    (sum_sq / n as f64).sqrt()
}

/// Whether a forecast called the direction of the move from the prior close.
///
/// Direction is the sign of the change; a zero change only matches a zero
/// change.
pub fn directional_hit(predicted: f64, actual: f64, prior_close: f64) -> bool {
    sign_of(predicted - prior_close) == sign_of(actual - prior_close)
}

fn sign_of(delta: f64) -> i8 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 bars.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * (252.0_f64).sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside deviation or fewer than 2 bars.
pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);

    // Downside deviation: std of only negative excess returns
    let downside_sq: Vec<f64> = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();

    if downside_sq.is_empty() {
        return 0.0; // No downside → ratio undefined
    }

    let downside_var = downside_sq.iter().sum::<f64>() / returns.len() as f64;
    let downside_std = downside_var.sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean / downside_std) * (252.0_f64).sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Win rate: fraction of simulated trades with positive net P/L.
pub fn win_rate(trade_pnls: &[f64]) -> f64 {
    if trade_pnls.is_empty() {
        return 0.0;
    }
    let winners = trade_pnls.iter().filter(|&&p| p > 0.0).count();
    winners as f64 / trade_pnls.len() as f64
}

/// Average P/L of winning trades. Returns 0.0 when there are no winners.
pub fn average_win(trade_pnls: &[f64]) -> f64 {
    let wins: Vec<f64> = trade_pnls.iter().copied().filter(|&p| p > 0.0).collect();
    mean_f64(&wins)
}

/// Average magnitude of losing trades (positive number).
///
/// Returns 0.0 when there are no losers.
pub fn average_loss(trade_pnls: &[f64]) -> f64 {
    let losses: Vec<f64> = trade_pnls
        .iter()
        .copied()
        .filter(|&p| p < 0.0)
        .map(f64::abs)
        .collect();
    mean_f64(&losses)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Compute daily returns from an equity curve.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
