//! ModelEstimate — one model's point forecast for one evaluation instant.

use serde::{Deserialize, Serialize};

/// Weighting class a model belongs to.
///
/// The regime tilt moves weight between `Stable` and `TrendSensitive`
/// families as realized volatility changes; `Neutral` models keep their base
/// weight in every regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelFamily {
    /// Regression-style models that hold up in quiet tape.
    Stable,
    /// Models whose weight is never tilted.
    Neutral,
    /// Momentum/sequence-style models favored when volatility picks up.
    TrendSensitive,
}

/// A single model's next-close estimate. Ephemeral: produced per evaluation
/// instant, consumed by the combiner, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEstimate {
    /// Model identifier, e.g. "ridge", "ema_momentum".
    pub model: String,
    pub family: ModelFamily,
    /// Predicted next close.
    pub value: f64,
    /// In-sample residual variance, when the model tracks one.
    pub variance: Option<f64>,
}

impl ModelEstimate {
    pub fn new(model: impl Into<String>, family: ModelFamily, value: f64) -> Self {
        Self {
            model: model.into(),
            family,
            value,
            variance: None,
        }
    }

    pub fn with_variance(mut self, variance: f64) -> Self {
        self.variance = Some(variance);
        self
    }

    /// An estimate is usable only if its point value is a finite number.
    pub fn is_viable(&self) -> bool {
        self.value.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viable_estimate() {
        let e = ModelEstimate::new("ridge", ModelFamily::Stable, 101.5);
        assert!(e.is_viable());
        assert_eq!(e.variance, None);
    }

    #[test]
    fn non_finite_estimate_is_not_viable() {
        let nan = ModelEstimate::new("ridge", ModelFamily::Stable, f64::NAN);
        let inf = ModelEstimate::new("ema", ModelFamily::TrendSensitive, f64::INFINITY);
        assert!(!nan.is_viable());
        assert!(!inf.is_viable());
    }

    #[test]
    fn variance_builder() {
        let e = ModelEstimate::new("ridge", ModelFamily::Stable, 101.5).with_variance(0.04);
        assert_eq!(e.variance, Some(0.04));
    }
}
