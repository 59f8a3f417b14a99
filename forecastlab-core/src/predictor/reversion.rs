//! Window mean-reversion adapter — the neutral model family.

use super::{ModelFitError, PredictorAdapter};
use crate::domain::{FeatureBar, ModelEstimate, ModelFamily};

const MODEL_NAME: &str = "mean_reversion";

/// Predicts a partial pull of the last close back toward its rolling mean.
///
/// `alpha` is the reversion strength: 0 predicts the last close unchanged,
/// 1 predicts the full rolling mean.
#[derive(Debug, Clone)]
pub struct WindowMeanReversion {
    window: usize,
    alpha: f64,
    fitted_mean: Option<f64>,
}

impl WindowMeanReversion {
    pub fn new(window: usize, alpha: f64) -> Self {
        Self {
            window: window.max(2),
            alpha: alpha.clamp(0.0, 1.0),
            fitted_mean: None,
        }
    }
}

impl Default for WindowMeanReversion {
    fn default() -> Self {
        Self::new(10, 0.3)
    }
}

impl PredictorAdapter for WindowMeanReversion {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Neutral
    }

    fn min_history(&self) -> usize {
        self.window
    }

    fn fit(&mut self, history: &[FeatureBar]) -> Result<(), ModelFitError> {
        let n = history.len();
        if n < self.window {
            return Err(ModelFitError::InsufficientData {
                model: MODEL_NAME.to_string(),
                needed: self.window,
                got: n,
            });
        }
        let tail = &history[n - self.window..];
        let mean = tail.iter().map(|b| b.close).sum::<f64>() / self.window as f64;
        self.fitted_mean = Some(mean);
        Ok(())
    }

    fn predict(&self, history: &[FeatureBar]) -> Result<ModelEstimate, ModelFitError> {
        let mean = self.fitted_mean.ok_or_else(|| ModelFitError::Unfitted {
            model: MODEL_NAME.to_string(),
        })?;
        let last = history.last().ok_or_else(|| ModelFitError::InsufficientData {
            model: MODEL_NAME.to_string(),
            needed: 1,
            got: 0,
        })?;
        let value = last.close + self.alpha * (mean - last.close);
        Ok(ModelEstimate::new(MODEL_NAME, ModelFamily::Neutral, value))
    }
}
