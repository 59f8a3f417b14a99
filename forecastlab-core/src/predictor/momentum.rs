//! EMA momentum adapter — the trend-sensitive model family.

use super::{ModelFitError, PredictorAdapter};
use crate::domain::{FeatureBar, ModelEstimate, ModelFamily};

const MODEL_NAME: &str = "ema_momentum";

/// Extrapolates the last close by an exponential moving average of one-step
/// price changes. The EMA runs over the whole prefix, so older changes decay
/// smoothly instead of falling off a window edge.
#[derive(Debug, Clone)]
pub struct EmaMomentum {
    span: usize,
    fitted_drift: Option<f64>,
}

impl EmaMomentum {
    pub fn new(span: usize) -> Self {
        Self {
            span: span.max(2),
            fitted_drift: None,
        }
    }
}

impl Default for EmaMomentum {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PredictorAdapter for EmaMomentum {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::TrendSensitive
    }

    fn min_history(&self) -> usize {
        self.span + 1
    }

    fn fit(&mut self, history: &[FeatureBar]) -> Result<(), ModelFitError> {
        let n = history.len();
        if n < self.min_history() {
            return Err(ModelFitError::InsufficientData {
                model: MODEL_NAME.to_string(),
                needed: self.min_history(),
                got: n,
            });
        }
        let alpha = 2.0 / (self.span as f64 + 1.0);
        let mut ema = history[1].close - history[0].close;
        for pair in history.windows(2).skip(1) {
            let change = pair[1].close - pair[0].close;
            ema = alpha * change + (1.0 - alpha) * ema;
        }
        if !ema.is_finite() {
            return Err(ModelFitError::NumericalInstability {
                model: MODEL_NAME.to_string(),
                detail: "non-finite drift".to_string(),
            });
        }
        self.fitted_drift = Some(ema);
        Ok(())
    }

    fn predict(&self, history: &[FeatureBar]) -> Result<ModelEstimate, ModelFitError> {
        let drift = self.fitted_drift.ok_or_else(|| ModelFitError::Unfitted {
            model: MODEL_NAME.to_string(),
        })?;
        let last = history.last().ok_or_else(|| ModelFitError::InsufficientData {
            model: MODEL_NAME.to_string(),
            needed: 1,
            got: 0,
        })?;
        Ok(ModelEstimate::new(
            MODEL_NAME,
            ModelFamily::TrendSensitive,
            last.close + drift,
        ))
    }
}
