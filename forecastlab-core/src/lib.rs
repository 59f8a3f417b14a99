//! ForecastLab Core — domain types, predictor adapters, ensemble combination.
//!
//! This crate contains the pure, in-memory half of the validation engine:
//! - Domain types (feature bars, validated series, estimates, forecasts)
//! - The predictor adapter contract and the built-in model families
//! - Regime-sensitive ensemble combination with uncertainty bands
//! - Realized-volatility helper feeding the regime classifier
//!
//! No I/O happens here. Orchestration (walk-forward validation, drift
//! monitoring, sizing) lives in `forecastlab-runner`.

pub mod domain;
pub mod ensemble;
pub mod predictor;
pub mod volatility;

pub use domain::{
    EnsembleForecast, FeatureBar, HistoricalSeries, ModelContribution, ModelEstimate, ModelFamily,
    SeriesError, VolRegime,
};
pub use ensemble::{CombineError, Combiner, EnsembleConfig};
pub use predictor::{
    EmaMomentum, ModelFitError, ModelSlot, PredictorAdapter, PredictorSet, RidgeRegression,
    WindowMeanReversion,
};
pub use volatility::realized_volatility;
