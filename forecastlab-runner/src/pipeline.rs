//! End-to-end validation pipeline: backtest, drift surveillance, sizing.
//!
//! One symbol flows through three stages. The walk-forward backtest scores
//! the ensemble out of sample; its residuals are split chronologically so
//! the trailing holdout streams through a fresh drift detector exactly as
//! live residuals would; the sizing stage turns the realized win statistics
//! and the drift verdict into a position recommendation. A universe run
//! fans the same flow across symbols in parallel, collecting per-symbol
//! failures instead of aborting the batch.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use forecastlab_core::domain::HistoricalSeries;
use forecastlab_core::predictor::PredictorSet;

use crate::backtest::{run_walk_forward, BacktestError, BacktestRecord};
use crate::config::ValidationConfig;
use crate::drift::{DriftDetector, DriftState};
use crate::metrics;
use crate::sizing::{size, SizingDecision, SizingError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error(transparent)]
    Sizing(#[from] SizingError),
}

/// Everything the pipeline concludes about one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolValidation {
    pub symbol: String,
    /// Config hash the verdict was produced under.
    pub config_id: String,
    pub record: BacktestRecord,
    pub drift: DriftState,
    /// Position recommendation; `None` when the backtest never traded or
    /// never won, so the Kelly inputs would be meaningless.
    pub sizing: Option<SizingDecision>,
}

/// Run the full validation flow for one symbol.
pub fn validate_symbol(
    series: &HistoricalSeries,
    config: &ValidationConfig,
) -> Result<SymbolValidation, PipelineError> {
    let mut predictors = PredictorSet::standard();
    let backtest_config = config.to_backtest_config();
    let record = run_walk_forward(series, &mut predictors, &backtest_config)?;

    let drift = surveil_residuals(series.symbol(), &record, config);

    let win_loss_ratio = record.win_loss_ratio();
    let sizing = if record.total_trades == 0 {
        warn!(symbol = %series.symbol(), "backtest produced no trades; skipping sizing");
        None
    } else if win_loss_ratio <= 0.0 {
        warn!(symbol = %series.symbol(), "backtest had no winning trades; skipping sizing");
        None
    } else {
        let entry_price = series.bars()[series.len() - 1].close;
        Some(size(
            config.simulation.initial_capital,
            entry_price,
            record.win_rate,
            win_loss_ratio,
            &drift,
            &config.sizing,
        )?)
    };

    info!(
        symbol = %series.symbol(),
        accuracy = record.directional_accuracy,
        drift = %drift.status,
        sized = sizing.is_some(),
        "validation complete"
    );

    Ok(SymbolValidation {
        symbol: series.symbol().to_string(),
        config_id: config.config_id(),
        record,
        drift,
        sizing,
    })
}

/// Split residuals chronologically and stream the holdout through a fresh
/// detector, pairing each residual with its direction outcome.
fn surveil_residuals(
    symbol: &str,
    record: &BacktestRecord,
    config: &ValidationConfig,
) -> DriftState {
    let residuals = record.residuals();
    let holdout_len = holdout_split(residuals.len(), config.validation.holdout_fraction);
    let split = residuals.len() - holdout_len;
    let (baseline, _holdout) = residuals.split_at(split);

    let mut detector = DriftDetector::new(
        symbol,
        config.config_id(),
        baseline.to_vec(),
        config.drift.clone(),
    );

    let mut state = detector.evaluate(&[], baseline);
    for step in &record.steps[split..] {
        detector.record_direction(metrics::directional_hit(
            step.predicted,
            step.actual,
            step.prior_close,
        ));
        state = detector.update(step.residual());
    }
    state
}

/// Trailing holdout length: at least one sample on each side of the split
/// whenever the run produced two or more residuals.
fn holdout_split(len: usize, fraction: f64) -> usize {
    if len < 2 {
        return 0;
    }
    let raw = (len as f64 * fraction).round() as usize;
    raw.clamp(1, len - 1)
}

/// A symbol whose validation could not complete.
#[derive(Debug)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: PipelineError,
}

/// Batch results: failures are kept alongside successes.
#[derive(Debug)]
pub struct UniverseValidation {
    pub results: Vec<SymbolValidation>,
    pub failures: Vec<SymbolFailure>,
}

impl UniverseValidation {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Validate every series in parallel. A failing symbol is reported, not
/// fatal; the rest of the universe still completes.
pub fn validate_universe(
    universe: &[HistoricalSeries],
    config: &ValidationConfig,
) -> UniverseValidation {
    let outcomes: Vec<Result<SymbolValidation, SymbolFailure>> = universe
        .par_iter()
        .map(|series| {
            validate_symbol(series, config).map_err(|error| SymbolFailure {
                symbol: series.symbol().to_string(),
                error,
            })
        })
        .collect();

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(validation) => results.push(validation),
            Err(failure) => failures.push(failure),
        }
    }
    if !failures.is_empty() {
        warn!(
            failed = failures.len(),
            total = universe.len(),
            "universe validation had failures"
        );
    }
    UniverseValidation { results, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::generate_synthetic_series;
    use chrono::NaiveDate;
    use forecastlab_core::domain::FeatureBar;

    fn synthetic(symbol: &str) -> HistoricalSeries {
        generate_synthetic_series(
            symbol,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 8, 30).unwrap(),
        )
        .unwrap()
    }

    fn flat_series(n: usize) -> HistoricalSeries {
        let base_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = (0..n)
            .map(|i| {
                FeatureBar::from_ohlcv(
                    base_date + chrono::Duration::days(i as i64),
                    100.0,
                    100.5,
                    99.5,
                    100.0,
                    10_000,
                )
            })
            .collect();
        HistoricalSeries::new("FLAT", bars).unwrap()
    }

    // ── Holdout split ──

    #[test]
    fn holdout_split_bounds() {
        assert_eq!(holdout_split(0, 0.3), 0);
        assert_eq!(holdout_split(1, 0.3), 0);
        assert_eq!(holdout_split(2, 0.3), 1);
        assert_eq!(holdout_split(10, 0.3), 3);
        // Always leaves at least one sample on each side.
        assert_eq!(holdout_split(10, 0.999), 9);
        assert_eq!(holdout_split(10, 0.001), 1);
    }

    // ── Single-symbol flow ──

    #[test]
    fn full_flow_produces_a_coherent_verdict() {
        let series = synthetic("PIPE");
        let config = ValidationConfig::default();
        let validation = validate_symbol(&series, &config).unwrap();

        assert_eq!(validation.symbol, "PIPE");
        assert_eq!(validation.config_id, config.config_id());
        assert!(validation.record.evaluated_steps > 0);
        assert!(validation.record.total_trades > 0);

        // Baseline plus streamed holdout covers every residual.
        let steps = validation.record.evaluated_steps;
        let holdout = holdout_split(steps, config.validation.holdout_fraction);
        assert_eq!(validation.drift.baseline_samples, steps - holdout);
        assert_eq!(validation.drift.recent_samples, holdout);

        match &validation.sizing {
            Some(decision) => {
                assert!(decision.risk_fraction <= config.sizing.hard_cap_pct + 1e-12);
                assert!(decision.position_value >= 0.0);
            }
            None => {
                assert!(
                    validation.record.total_trades == 0
                        || validation.record.win_loss_ratio() <= 0.0
                );
            }
        }
    }

    #[test]
    fn flat_market_sizes_nothing() {
        // Forecasts land within rounding noise of the prior close: the dead
        // band keeps the replay out of the market, and with zero trades
        // there is nothing to size.
        let series = flat_series(160);
        let config = ValidationConfig::default();
        let validation = validate_symbol(&series, &config).unwrap();

        assert_eq!(validation.record.total_trades, 0);
        assert!(validation.sizing.is_none());
    }

    #[test]
    fn short_series_fails_cleanly() {
        let series = generate_synthetic_series(
            "SHORT",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
        )
        .unwrap();
        let err = validate_symbol(&series, &ValidationConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Backtest(BacktestError::InsufficientHistory { .. })
        ));
    }

    // ── Universe fan-out ──

    #[test]
    fn universe_keeps_going_past_a_failure() {
        let universe = vec![
            synthetic("GOOD"),
            generate_synthetic_series(
                "BAD",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .unwrap(),
        ];
        let config = ValidationConfig::default();
        let outcome = validate_universe(&universe, &config);

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].symbol, "GOOD");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].symbol, "BAD");
        assert!(!outcome.is_clean());
    }

    #[test]
    fn universe_results_are_deterministic_across_runs() {
        let universe = vec![synthetic("AAA"), synthetic("BBB")];
        let config = ValidationConfig::default();
        let first = validate_universe(&universe, &config);
        let second = validate_universe(&universe, &config);

        assert!(first.is_clean());
        assert_eq!(first.results.len(), second.results.len());
        for (a, b) in first.results.iter().zip(second.results.iter()) {
            assert_eq!(a.record.record_id, b.record.record_id);
            assert_eq!(a.record.final_equity, b.record.final_equity);
            assert_eq!(a.drift.status, b.drift.status);
        }
    }
}
