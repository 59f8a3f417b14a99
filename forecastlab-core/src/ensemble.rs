//! Ensemble combination — merges model estimates into one forecast under
//! regime-sensitive weighting.
//!
//! Weight resolution pipeline:
//! 1. Drop non-finite estimates and estimates with no base weight (logged,
//!    never fatal on their own).
//! 2. Normalize the surviving base weights to sum to 1.
//! 3. Classify the volatility regime and tilt family weights, bounded by
//!    `max_tilt`, monotonic in the volatility input.
//! 4. Renormalize and take the weighted mean; the uncertainty band comes
//!    from the weighted dispersion of the survivors, so it widens exactly
//!    when the models disagree.

use crate::domain::{EnsembleForecast, ModelContribution, ModelEstimate, ModelFamily, VolRegime};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Combination failed outright. Per-model problems never raise this; only a
/// round where *no* model survives does.
#[derive(Debug, Error)]
pub enum CombineError {
    #[error(
        "no viable estimate: {considered} candidate(s), {viable} finite, {weighted} carried weight"
    )]
    NoViableEstimate {
        considered: usize,
        viable: usize,
        weighted: usize,
    },
}

/// Tuning for the combiner. Defaults mirror the validated production values:
/// regime threshold 0.03 on 20-day realized volatility, ±30% maximum family
/// tilt, 1.28 band multiplier (two-sided 80% normal quantile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Realized volatility above this is the high-vol regime.
    pub volatility_threshold: f64,
    /// Maximum fractional weight shift applied to a tilted family.
    pub max_tilt: f64,
    /// Band half-width in units of weighted estimate dispersion.
    pub confidence_multiplier: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            volatility_threshold: 0.03,
            max_tilt: 0.30,
            confidence_multiplier: 1.28,
        }
    }
}

/// Regime-weighted estimate combiner.
#[derive(Debug, Clone)]
pub struct Combiner {
    config: EnsembleConfig,
}

impl Combiner {
    /// `max_tilt` is clamped below 1 so a tilted family can never reach a
    /// zero or negative weight.
    pub fn new(mut config: EnsembleConfig) -> Self {
        config.max_tilt = config.max_tilt.clamp(0.0, 0.95);
        config.volatility_threshold = config.volatility_threshold.max(f64::MIN_POSITIVE);
        config.confidence_multiplier = config.confidence_multiplier.max(0.0);
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Merge the estimates for `target_date` into one forecast.
    ///
    /// `volatility` is the current realized-volatility reading; `None` means
    /// the feature is unavailable, which disables the tilt and reports the
    /// low-vol regime. `base_weights` maps model name to nominal weight;
    /// models missing from it are excluded with a logged notice.
    pub fn combine(
        &self,
        target_date: NaiveDate,
        estimates: &BTreeMap<String, ModelEstimate>,
        volatility: Option<f64>,
        base_weights: &BTreeMap<String, f64>,
    ) -> Result<EnsembleForecast, CombineError> {
        let considered = estimates.len();
        let mut viable = 0usize;
        let mut candidates: Vec<(&ModelEstimate, f64)> = Vec::with_capacity(considered);

        for (name, estimate) in estimates {
            if !estimate.is_viable() {
                warn!(model = %name, value = estimate.value, "non-finite estimate excluded");
                continue;
            }
            viable += 1;
            match base_weights.get(name).copied() {
                Some(w) if w > 0.0 => candidates.push((estimate, w)),
                Some(_) | None => {
                    warn!(model = %name, "no base weight configured; estimate excluded");
                }
            }
        }

        if candidates.is_empty() {
            return Err(CombineError::NoViableEstimate {
                considered,
                viable,
                weighted: 0,
            });
        }

        // Normalize the surviving base weights. This also absorbs weight
        // freed by models that produced nothing this round.
        let base_sum: f64 = candidates.iter().map(|(_, w)| w).sum();
        for (_, w) in candidates.iter_mut() {
            *w /= base_sum;
        }

        let (regime, tilt) = self.classify(volatility);
        let shift = self.config.max_tilt * tilt;
        for (estimate, w) in candidates.iter_mut() {
            let factor = match (regime, estimate.family) {
                (VolRegime::HighVol, ModelFamily::TrendSensitive) => 1.0 + shift,
                (VolRegime::HighVol, ModelFamily::Stable) => 1.0 - shift,
                (VolRegime::LowVol, ModelFamily::Stable) => 1.0 + shift,
                (VolRegime::LowVol, ModelFamily::TrendSensitive) => 1.0 - shift,
                (_, ModelFamily::Neutral) => 1.0,
            };
            *w *= factor;
        }
        let tilted_sum: f64 = candidates.iter().map(|(_, w)| w).sum();
        for (_, w) in candidates.iter_mut() {
            *w /= tilted_sum;
        }

        let point_value: f64 = candidates.iter().map(|(e, w)| e.value * w).sum();
        let dispersion: f64 = candidates
            .iter()
            .map(|(e, w)| w * (e.value - point_value).powi(2))
            .sum::<f64>()
            .sqrt();
        let half_band = self.config.confidence_multiplier * dispersion;

        let contributions = candidates
            .iter()
            .map(|(e, w)| ModelContribution {
                model: e.model.clone(),
                estimate: e.value,
                weight: *w,
            })
            .collect();

        Ok(EnsembleForecast {
            target_date,
            point_value,
            lower_bound: point_value - half_band,
            upper_bound: point_value + half_band,
            contributions,
            regime,
        })
    }

    /// Regime label plus tilt strength in [0, 1].
    ///
    /// Tilt ramps linearly with distance from the threshold and saturates
    /// one threshold-width away, so it is continuous at the boundary and
    /// monotonic on each side.
    fn classify(&self, volatility: Option<f64>) -> (VolRegime, f64) {
        let threshold = self.config.volatility_threshold;
        match volatility {
            None => (VolRegime::LowVol, 0.0),
            Some(v) if v > threshold => {
                (VolRegime::HighVol, ((v - threshold) / threshold).min(1.0))
            }
            Some(v) => (
                VolRegime::LowVol,
                ((threshold - v) / threshold).clamp(0.0, 1.0),
            ),
        }
    }
}

impl Default for Combiner {
    fn default() -> Self {
        Self::new(EnsembleConfig::default())
    }
}
