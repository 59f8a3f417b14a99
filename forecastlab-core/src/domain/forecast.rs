//! EnsembleForecast — the combined multi-model forecast with its band.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Realized-volatility regime used to resolve ensemble weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolRegime {
    LowVol,
    HighVol,
}

impl std::fmt::Display for VolRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolRegime::LowVol => write!(f, "LOW_VOL"),
            VolRegime::HighVol => write!(f, "HIGH_VOL"),
        }
    }
}

/// One model's share of a combined forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelContribution {
    pub model: String,
    /// The model's own point estimate.
    pub estimate: f64,
    /// Resolved weight after regime tilt and renormalization.
    pub weight: f64,
}

/// Combined forecast for one target date. Immutable once built; the caller
/// owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleForecast {
    /// Date of the close being predicted.
    pub target_date: NaiveDate,
    /// Weighted mean of the contributing estimates.
    pub point_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Per-model estimates and resolved weights; weights sum to 1.
    pub contributions: Vec<ModelContribution>,
    pub regime: VolRegime,
}

impl EnsembleForecast {
    /// Number of models that contributed.
    pub fn model_count(&self) -> usize {
        self.contributions.len()
    }

    /// Width of the uncertainty band.
    pub fn band_width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// Resolved weight for a model, if it contributed.
    pub fn weight_of(&self, model: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.model == model)
            .map(|c| c.weight)
    }
}
