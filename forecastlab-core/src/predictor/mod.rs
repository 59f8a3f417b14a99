//! Predictor adapters — the uniform fit/predict contract every model family
//! implements.
//!
//! Responsibilities:
//! - Wrap one underlying model behind `fit(prefix)` / `predict(prefix)`.
//! - Report the model's name, weighting family, and minimum history.
//! - Fail with a typed `ModelFitError` instead of guessing on thin or
//!   degenerate data.
//!
//! Non-responsibilities:
//! - No weighting or combination (see `ensemble`).
//! - No awareness of evaluation order; adapters see only the prefix the
//!   walk-forward driver hands them.

use crate::domain::{FeatureBar, ModelEstimate, ModelFamily};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

mod momentum;
mod reversion;
mod ridge;

pub use momentum::EmaMomentum;
pub use reversion::WindowMeanReversion;
pub use ridge::RidgeRegression;

/// A model failed to fit or predict. Local to one model at one evaluation
/// instant; the caller drops the model's contribution and carries on.
#[derive(Debug, Error)]
pub enum ModelFitError {
    #[error("{model}: needs {needed} bars, got {got}")]
    InsufficientData {
        model: String,
        needed: usize,
        got: usize,
    },

    #[error("{model}: bar {date} is missing feature '{feature}'")]
    MissingFeature {
        model: String,
        feature: String,
        date: chrono::NaiveDate,
    },

    #[error("{model}: {detail}")]
    NumericalInstability { model: String, detail: String },

    #[error("{model}: predict called before fit")]
    Unfitted { model: String },
}

/// Uniform wrapper around one predictive model.
///
/// Contract: `fit` learns from the given history prefix; `predict` then
/// produces an estimate for the close immediately after the prefix. Calling
/// `predict` before a successful `fit` is an error. Implementations must be
/// deterministic: same prefix in, same estimate out.
pub trait PredictorAdapter: Send + Sync {
    /// Stable identifier used to key base weights, e.g. "ridge".
    fn name(&self) -> &str;

    /// Weighting class for the regime tilt.
    fn family(&self) -> ModelFamily;

    /// Minimum number of bars `fit` needs.
    fn min_history(&self) -> usize;

    /// Learn from the prefix. Replaces any previously fitted state.
    fn fit(&mut self, history: &[FeatureBar]) -> Result<(), ModelFitError>;

    /// Estimate the next close after the prefix.
    fn predict(&self, history: &[FeatureBar]) -> Result<ModelEstimate, ModelFitError>;
}

/// Availability of one model slot.
///
/// Heavyweight model backends may be absent in a given build or deployment;
/// that absence is data carried here, once, instead of presence checks
/// scattered through call sites. An `Unavailable` slot never produces an
/// estimate and is reported at construction.
pub enum ModelSlot {
    Available(Box<dyn PredictorAdapter>),
    Unavailable { name: String, reason: String },
}

impl ModelSlot {
    pub fn name(&self) -> &str {
        match self {
            ModelSlot::Available(model) => model.name(),
            ModelSlot::Unavailable { name, .. } => name,
        }
    }
}

/// The full adapter set driven by one validation run.
///
/// Centralizes fit/predict over a prefix: models that fail are dropped for
/// that instant with a logged notice, and the survivors' estimates are
/// returned keyed by model name. Whether *zero* survivors is fatal is the
/// caller's decision (the combiner refuses to fabricate a forecast; the
/// backtester skips the step).
pub struct PredictorSet {
    slots: Vec<ModelSlot>,
}

impl PredictorSet {
    pub fn new(slots: Vec<ModelSlot>) -> Self {
        for slot in &slots {
            if let ModelSlot::Unavailable { name, reason } = slot {
                warn!(model = %name, %reason, "model unavailable, slot disabled");
            }
        }
        Self { slots }
    }

    pub fn with_models(models: Vec<Box<dyn PredictorAdapter>>) -> Self {
        Self::new(models.into_iter().map(ModelSlot::Available).collect())
    }

    /// The stock three-family set: ridge regression (stable), window mean
    /// reversion (neutral), EMA momentum (trend-sensitive).
    pub fn standard() -> Self {
        Self::with_models(vec![
            Box::new(RidgeRegression::default()),
            Box::new(WindowMeanReversion::default()),
            Box::new(EmaMomentum::default()),
        ])
    }

    /// Names of slots that can produce estimates.
    pub fn available_names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| matches!(s, ModelSlot::Available(_)))
            .map(|s| s.name())
            .collect()
    }

    /// Count of available slots.
    pub fn available_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, ModelSlot::Available(_)))
            .count()
    }

    /// Fit every available model on the prefix and collect the estimates
    /// that survive. Per-model failures are logged and absorbed.
    pub fn estimates(&mut self, history: &[FeatureBar]) -> BTreeMap<String, ModelEstimate> {
        let mut out = BTreeMap::new();
        for slot in &mut self.slots {
            let ModelSlot::Available(model) = slot else {
                continue;
            };
            if let Err(e) = model.fit(history) {
                debug!(model = model.name(), error = %e, "fit failed, dropping estimate");
                continue;
            }
            match model.predict(history) {
                Ok(estimate) if estimate.is_viable() => {
                    out.insert(estimate.model.clone(), estimate);
                }
                Ok(estimate) => {
                    debug!(
                        model = %estimate.model,
                        value = estimate.value,
                        "non-finite estimate, dropping"
                    );
                }
                Err(e) => {
                    debug!(model = model.name(), error = %e, "predict failed, dropping estimate");
                }
            }
        }
        out
    }
}
