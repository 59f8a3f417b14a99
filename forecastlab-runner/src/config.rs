//! Validation-run configuration — one TOML file drives the whole pipeline.
//!
//! Every section is optional and every field has a production default, so
//! an empty file is a valid config. `config_id()` content-hashes the whole
//! document; the pipeline reports it as the model version under drift
//! surveillance, which makes "same config, same verdict" checkable.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use forecastlab_core::ensemble::EnsembleConfig;

use crate::backtest::{standard_weights, BacktestConfig, SimulationConfig};
use crate::drift::DriftConfig;
use crate::sizing::SizingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

/// Walk-forward loop parameters (`[backtest]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub warmup_window: usize,
    pub step: usize,
    pub vol_window: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            warmup_window: 60,
            step: 1,
            vol_window: 20,
        }
    }
}

/// Residual split between drift baseline and holdout (`[validation]`
/// section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Trailing fraction of residuals treated as the "recent" drift sample;
    /// the leading remainder becomes the baseline.
    pub holdout_fraction: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.3,
        }
    }
}

/// Top-level configuration for a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub backtest: BacktestSettings,
    pub ensemble: EnsembleConfig,
    /// Nominal model weights before the regime tilt (`[weights]` table).
    pub weights: BTreeMap<String, f64>,
    pub simulation: SimulationConfig,
    pub drift: DriftConfig,
    pub sizing: SizingConfig,
    pub validation: ValidationSettings,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            backtest: BacktestSettings::default(),
            ensemble: EnsembleConfig::default(),
            weights: standard_weights(),
            simulation: SimulationConfig::default(),
            drift: DriftConfig::default(),
            sizing: SizingConfig::default(),
            validation: ValidationSettings::default(),
        }
    }
}

impl ValidationConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field consistency checks beyond what serde can express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: String| Err(ConfigError::Invalid { reason });

        if self.backtest.vol_window < 2 {
            return fail(format!(
                "backtest.vol_window must be at least 2, got {}",
                self.backtest.vol_window
            ));
        }
        if !(self.validation.holdout_fraction > 0.0 && self.validation.holdout_fraction < 1.0) {
            return fail(format!(
                "validation.holdout_fraction must be in (0, 1), got {}",
                self.validation.holdout_fraction
            ));
        }
        if self.weights.is_empty() {
            return fail("weights table must name at least one model".to_string());
        }
        for (model, weight) in &self.weights {
            if !weight.is_finite() || *weight <= 0.0 {
                return fail(format!("weight for '{model}' must be positive, got {weight}"));
            }
        }
        if !(self.simulation.initial_capital.is_finite() && self.simulation.initial_capital > 0.0)
        {
            return fail(format!(
                "simulation.initial_capital must be positive, got {}",
                self.simulation.initial_capital
            ));
        }
        if !(self.simulation.position_fraction > 0.0 && self.simulation.position_fraction <= 1.0)
        {
            return fail(format!(
                "simulation.position_fraction must be in (0, 1], got {}",
                self.simulation.position_fraction
            ));
        }
        if !(self.drift.ks_alpha > 0.0 && self.drift.ks_alpha < 1.0) {
            return fail(format!(
                "drift.ks_alpha must be in (0, 1), got {}",
                self.drift.ks_alpha
            ));
        }
        if !(self.drift.critical_alpha > 0.0 && self.drift.critical_alpha <= self.drift.ks_alpha)
        {
            return fail(format!(
                "drift.critical_alpha must be in (0, ks_alpha], got {}",
                self.drift.critical_alpha
            ));
        }
        if self.drift.min_samples < 2 {
            return fail(format!(
                "drift.min_samples must be at least 2, got {}",
                self.drift.min_samples
            ));
        }
        if !(self.drift.baseline_accuracy > 0.0 && self.drift.baseline_accuracy <= 1.0) {
            return fail(format!(
                "drift.baseline_accuracy must be in (0, 1], got {}",
                self.drift.baseline_accuracy
            ));
        }
        if !(self.sizing.fractional_kelly > 0.0 && self.sizing.fractional_kelly <= 1.0) {
            return fail(format!(
                "sizing.fractional_kelly must be in (0, 1], got {}",
                self.sizing.fractional_kelly
            ));
        }
        if !(self.sizing.hard_cap_pct > 0.0 && self.sizing.hard_cap_pct < 1.0) {
            return fail(format!(
                "sizing.hard_cap_pct must be in (0, 1), got {}",
                self.sizing.hard_cap_pct
            ));
        }
        if !(self.sizing.critical_haircut >= 0.0 && self.sizing.critical_haircut <= 1.0) {
            return fail(format!(
                "sizing.critical_haircut must be in [0, 1], got {}",
                self.sizing.critical_haircut
            ));
        }
        Ok(())
    }

    /// Deterministic content hash. Two runs with identical configs share an
    /// ID, so their records are directly comparable.
    pub fn config_id(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Assembles the runtime configuration the walk-forward loop consumes.
    pub fn to_backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            warmup_window: self.backtest.warmup_window,
            step: self.backtest.step,
            vol_window: self.backtest.vol_window,
            ensemble: self.ensemble.clone(),
            base_weights: self.weights.clone(),
            simulation: self.simulation.clone(),
        }
    }
}
