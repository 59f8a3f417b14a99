//! Walk-forward backtester — grow-the-prefix validation with a paper ledger.
//!
//! Each step fits every model on the visible prefix, combines their
//! estimates into a forecast for the next close, and scores the forecast
//! once that close prints. A deterministic paper-trading replay turns the
//! same forecasts into an equity curve so the risk metrics have something to
//! chew on. Nothing from bar i+1 or later is visible when step i forecasts.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use forecastlab_core::domain::{HistoricalSeries, VolRegime};
use forecastlab_core::ensemble::{Combiner, EnsembleConfig};
use forecastlab_core::predictor::PredictorSet;
use forecastlab_core::volatility::realized_volatility;

use crate::metrics;

/// Current schema version for persisted records.
pub const SCHEMA_VERSION: u32 = 1;

/// Nominal weights for the standard three-model set.
pub fn standard_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("ridge".to_string(), 0.4),
        ("mean_reversion".to_string(), 0.3),
        ("ema_momentum".to_string(), 0.3),
    ])
}

/// Walk-forward parameters plus everything the loop needs at each step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Bars reserved before the first forecast.
    pub warmup_window: usize,
    /// Bars advanced between forecasts; 1 = daily.
    pub step: usize,
    /// Trailing window for the realized-volatility reading fed to the
    /// combiner.
    pub vol_window: usize,
    pub ensemble: EnsembleConfig,
    /// Nominal model weights before the regime tilt.
    pub base_weights: BTreeMap<String, f64>,
    pub simulation: SimulationConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            warmup_window: 60,
            step: 1,
            vol_window: 20,
            ensemble: EnsembleConfig::default(),
            base_weights: standard_weights(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// Paper-trading replay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    /// Fraction of current equity committed per trade.
    pub position_fraction: f64,
    /// Cost per side, as a fraction of traded notional.
    pub transaction_cost_pct: f64,
    /// Entry-price offset applied against the trade direction.
    pub slippage_pct: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            position_fraction: 0.10,
            transaction_cost_pct: 0.001,
            slippage_pct: 0.0005,
        }
    }
}

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("series '{symbol}' has {len} bars; warmup of {warmup} needs at least {needed}")]
    InsufficientHistory {
        symbol: String,
        len: usize,
        warmup: usize,
        needed: usize,
    },
    /// Every step was skipped — a record full of NaN metrics helps nobody.
    #[error("all {attempted} walk-forward steps failed for '{symbol}'")]
    AllStepsFailed { symbol: String, attempted: usize },
}

/// One scored forecast inside a walk-forward run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Date of the close that was predicted.
    pub date: NaiveDate,
    pub predicted: f64,
    pub actual: f64,
    /// Last close the models were allowed to see.
    pub prior_close: f64,
    pub regime: VolRegime,
    /// Models that contributed to this forecast.
    pub model_count: usize,
}

impl StepRecord {
    /// Forecast residual: realized minus predicted.
    pub fn residual(&self) -> f64 {
        self.actual - self.predicted
    }
}

/// Complete result of one walk-forward validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRecord {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Deterministic content hash of (symbol, window, config).
    pub record_id: String,
    pub symbol: String,
    /// First predicted date.
    pub start_date: NaiveDate,
    /// Last predicted date.
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub evaluated_steps: usize,
    pub skipped_steps: usize,
    pub directional_accuracy: f64,
    pub mean_absolute_error: f64,
    pub rmse: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Maximum drawdown of the paper equity curve, as a positive percentage.
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_trades: usize,
    pub final_equity: f64,
    pub equity_curve: Vec<f64>,
    pub steps: Vec<StepRecord>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestRecord {
    /// Forecast residuals in step order, for the drift detector.
    pub fn residuals(&self) -> Vec<f64> {
        self.steps.iter().map(StepRecord::residual).collect()
    }

    /// Average win over average loss — the payoff ratio Kelly consumes.
    ///
    /// Capped at 100.0 when no losses were realized.
    pub fn win_loss_ratio(&self) -> f64 {
        if self.avg_loss < 1e-10 {
            return if self.avg_win > 0.0 { 100.0 } else { 0.0 };
        }
        (self.avg_win / self.avg_loss).min(100.0)
    }
}

/// Walk the series forward: at each step the models see `bars[0..=i]`, vote
/// on the close at `i + 1`, and are scored once it prints.
///
/// Per-model failures degrade the ensemble silently (the set logs them);
/// steps where no model or no forecast survives are skipped with a logged
/// notice and counted in `skipped_steps`. Fails outright only when the
/// series cannot host a single step, or every step was skipped.
pub fn run_walk_forward(
    series: &HistoricalSeries,
    predictors: &mut PredictorSet,
    config: &BacktestConfig,
) -> Result<BacktestRecord, BacktestError> {
    let bars = series.bars();
    let n = bars.len();
    let needed = config.warmup_window + 2;
    if n < needed {
        return Err(BacktestError::InsufficientHistory {
            symbol: series.symbol().to_string(),
            len: n,
            warmup: config.warmup_window,
            needed,
        });
    }

    let step = config.step.max(1);
    let combiner = Combiner::new(config.ensemble.clone());
    let closes = series.closes();

    let mut ledger = PaperLedger::new(&config.simulation);
    let mut steps: Vec<StepRecord> = Vec::new();
    let mut attempted = 0usize;
    let mut skipped = 0usize;

    let mut i = config.warmup_window;
    while i + 1 < n {
        attempted += 1;
        let target_date = bars[i + 1].date;
        let history = series.prefix(i + 1);

        let estimates = predictors.estimates(history);
        if estimates.is_empty() {
            skipped += 1;
            warn!(
                symbol = %series.symbol(),
                date = %target_date,
                "no model produced an estimate; skipping step"
            );
            i += step;
            continue;
        }

        let volatility = realized_volatility(&closes[..=i], config.vol_window);
        match combiner.combine(target_date, &estimates, volatility, &config.base_weights) {
            Ok(forecast) => {
                let prior_close = bars[i].close;
                let actual = bars[i + 1].close;
                ledger.apply(forecast.point_value, prior_close, actual);
                steps.push(StepRecord {
                    date: target_date,
                    predicted: forecast.point_value,
                    actual,
                    prior_close,
                    regime: forecast.regime,
                    model_count: forecast.model_count(),
                });
            }
            Err(err) => {
                skipped += 1;
                warn!(
                    symbol = %series.symbol(),
                    date = %target_date,
                    %err,
                    "no forecast for step; skipping"
                );
            }
        }
        i += step;
    }

    if steps.is_empty() {
        return Err(BacktestError::AllStepsFailed {
            symbol: series.symbol().to_string(),
            attempted,
        });
    }

    debug!(
        symbol = %series.symbol(),
        evaluated = steps.len(),
        skipped,
        "walk-forward complete"
    );

    Ok(assemble_record(series, config, steps, skipped, ledger))
}

fn assemble_record(
    series: &HistoricalSeries,
    config: &BacktestConfig,
    steps: Vec<StepRecord>,
    skipped: usize,
    ledger: PaperLedger,
) -> BacktestRecord {
    let predicted: Vec<f64> = steps.iter().map(|s| s.predicted).collect();
    let actual: Vec<f64> = steps.iter().map(|s| s.actual).collect();
    let hits = steps
        .iter()
        .filter(|s| metrics::directional_hit(s.predicted, s.actual, s.prior_close))
        .count();

    let start_date = steps[0].date;
    let end_date = steps[steps.len() - 1].date;
    let record_id = compute_record_id(series.symbol(), start_date, end_date, config);

    BacktestRecord {
        schema_version: SCHEMA_VERSION,
        record_id,
        symbol: series.symbol().to_string(),
        start_date,
        end_date,
        bar_count: series.len(),
        evaluated_steps: steps.len(),
        skipped_steps: skipped,
        directional_accuracy: hits as f64 / steps.len() as f64,
        mean_absolute_error: metrics::mean_absolute_error(&predicted, &actual),
        rmse: metrics::root_mean_squared_error(&predicted, &actual),
        sharpe_ratio: metrics::sharpe_ratio(&ledger.curve, 0.0),
        sortino_ratio: metrics::sortino_ratio(&ledger.curve, 0.0),
        max_drawdown_pct: -metrics::max_drawdown(&ledger.curve) * 100.0,
        win_rate: metrics::win_rate(&ledger.trade_pnls),
        avg_win: metrics::average_win(&ledger.trade_pnls),
        avg_loss: metrics::average_loss(&ledger.trade_pnls),
        total_trades: ledger.trade_pnls.len(),
        final_equity: ledger.equity,
        equity_curve: ledger.curve,
        steps,
    }
}

/// Deterministic content hash identifying one validation run.
fn compute_record_id(
    symbol: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    config: &BacktestConfig,
) -> String {
    #[derive(Serialize)]
    struct Fingerprint<'a> {
        symbol: &'a str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        config: &'a BacktestConfig,
    }
    let canonical = serde_json::to_string(&Fingerprint {
        symbol,
        start_date,
        end_date,
        config,
    })
    .unwrap_or_default();
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

/// Forecast edges smaller than this fraction of the prior close are
/// numerical noise; no cost model lets them profit, so the replay stays
/// flat instead of trading them.
const MIN_EDGE_FRACTION: f64 = 1e-9;

/// Deterministic paper-trading ledger driven by forecast direction.
///
/// Long when the forecast is above the prior close, short when below, flat
/// when the edge is inside the noise dead band. Entry at the prior close
/// with slippage against the trade, exit at the realized close, costs
/// charged per side.
#[derive(Debug)]
struct PaperLedger {
    position_fraction: f64,
    transaction_cost_pct: f64,
    slippage_pct: f64,
    equity: f64,
    curve: Vec<f64>,
    trade_pnls: Vec<f64>,
}

impl PaperLedger {
    fn new(config: &SimulationConfig) -> Self {
        Self {
            position_fraction: config.position_fraction,
            transaction_cost_pct: config.transaction_cost_pct,
            slippage_pct: config.slippage_pct,
            equity: config.initial_capital,
            curve: vec![config.initial_capital],
            trade_pnls: Vec::new(),
        }
    }

    fn apply(&mut self, predicted: f64, prior_close: f64, actual: f64) {
        let edge = predicted - prior_close;
        let dead_band = prior_close.abs() * MIN_EDGE_FRACTION;
        let direction = if edge > dead_band {
            1.0
        } else if edge < -dead_band {
            -1.0
        } else {
            // No conviction, no trade.
            self.curve.push(self.equity);
            return;
        };

        let entry = prior_close * (1.0 + direction * self.slippage_pct);
        let notional = self.equity * self.position_fraction;
        let shares = notional / entry;
        let gross = shares * (actual - entry) * direction;
        let costs = (shares * entry + shares * actual) * self.transaction_cost_pct;
        let net = gross - costs;

        self.equity += net;
        self.curve.push(self.equity);
        self.trade_pnls.push(net);
    }
}
