//! ForecastLab Runner — validation orchestration, drift surveillance, sizing.
//!
//! This crate builds on `forecastlab-core` to provide:
//! - CSV bar loading and deterministic synthetic series
//! - Walk-forward backtesting with a paper-trading ledger
//! - Forecast-quality and risk metrics
//! - Two-sample KS residual testing and streaming drift detection
//! - Fractional-Kelly position sizing with drift-aware haircuts
//! - Per-symbol pipeline, parallel universe runs, and artifact export

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod drift;
pub mod ks;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod sizing;

pub use backtest::{
    run_walk_forward, standard_weights, BacktestConfig, BacktestError, BacktestRecord,
    SimulationConfig, StepRecord, SCHEMA_VERSION,
};
pub use config::{BacktestSettings, ConfigError, ValidationConfig, ValidationSettings};
pub use data_loader::{generate_synthetic_series, load_csv, symbol_from_path, LoadError};
pub use drift::{DriftConfig, DriftDetector, DriftState, DriftStatus};
pub use ks::{ks_two_sample, KsTest};
pub use pipeline::{
    validate_symbol, validate_universe, PipelineError, SymbolFailure, SymbolValidation,
    UniverseValidation,
};
pub use report::{generate_report, load_artifacts, print_summary, save_artifacts};
pub use sizing::{size, SizingConfig, SizingDecision, SizingError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn record_types_are_send_sync() {
        assert_send::<BacktestRecord>();
        assert_sync::<BacktestRecord>();
        assert_send::<StepRecord>();
        assert_sync::<StepRecord>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<ValidationConfig>();
        assert_sync::<ValidationConfig>();
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<SimulationConfig>();
        assert_sync::<SimulationConfig>();
    }

    #[test]
    fn drift_types_are_send_sync() {
        assert_send::<DriftDetector>();
        assert_sync::<DriftDetector>();
        assert_send::<DriftState>();
        assert_sync::<DriftState>();
        assert_send::<KsTest>();
        assert_sync::<KsTest>();
    }

    #[test]
    fn verdict_types_are_send_sync() {
        assert_send::<SymbolValidation>();
        assert_sync::<SymbolValidation>();
        assert_send::<SizingDecision>();
        assert_sync::<SizingDecision>();
    }
}
