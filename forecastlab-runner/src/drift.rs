//! Model drift detection — residual-distribution shift and accuracy decay.
//!
//! A detector owns one (symbol, model-version) pair. It holds a frozen
//! baseline residual window, maintains a rolling recent window and a rolling
//! directional-accuracy window, and folds a two-sample KS test over the
//! residuals together with the accuracy trend into a single status.
//!
//! The status is a ratchet: STABLE < WARNING < CRITICAL. Once elevated it
//! never silently recovers — only [`DriftDetector::rebaseline`] after a
//! retrain clears it. Below the minimum sample count the detector reports
//! INSUFFICIENT, a valid "cannot judge" answer rather than an error.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ks::{ks_two_sample, KsTest};

/// Drift detector thresholds. All defaults follow the reference monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// KS p-value at or below which distribution drift is flagged.
    pub ks_alpha: f64,
    /// KS p-value at or below which drift is considered critical.
    pub critical_alpha: f64,
    /// Minimum residuals per side before the KS test is trusted.
    pub min_samples: usize,
    /// Most recent residuals retained for the streaming comparison.
    pub recent_window: usize,
    /// Rolling directional accuracy below this floor counts as a breach.
    pub accuracy_floor: f64,
    /// Number of direction records the rolling accuracy is computed over.
    pub accuracy_window: usize,
    /// Consecutive accuracy breaches that escalate to CRITICAL.
    pub breach_limit: usize,
    /// Accuracy the stability score treats as fully healthy.
    pub baseline_accuracy: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            ks_alpha: 0.05,
            critical_alpha: 0.01,
            min_samples: 20,
            recent_window: 60,
            accuracy_floor: 0.55,
            accuracy_window: 7,
            breach_limit: 3,
            baseline_accuracy: 0.58,
        }
    }
}

/// Detector verdict, ordered by severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftStatus {
    /// Not enough samples on one side to judge.
    Insufficient,
    /// No evidence of drift.
    Stable,
    /// Distribution shift or an accuracy breach streak has started.
    Warning,
    /// Strong distribution shift or sustained accuracy breach.
    Critical,
}

impl fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftStatus::Insufficient => "INSUFFICIENT",
            DriftStatus::Stable => "STABLE",
            DriftStatus::Warning => "WARNING",
            DriftStatus::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Snapshot of the detector after one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftState {
    pub status: DriftStatus,
    /// KS comparison of baseline vs recent residuals; `None` below the
    /// sample floor.
    pub ks: Option<KsTest>,
    /// Rolling directional accuracy; `None` until the window fills.
    pub rolling_accuracy: Option<f64>,
    /// Consecutive evaluations with accuracy below the floor.
    pub accuracy_breach_streak: usize,
    /// Composite health score in [0, 100]; 0 when the detector cannot judge.
    pub stability_score: f64,
    /// Set when KS drift is flagged or the breach streak hit its limit.
    pub retrain_recommended: bool,
    pub baseline_samples: usize,
    pub recent_samples: usize,
    pub last_evaluated_at: DateTime<Utc>,
}

impl DriftState {
    /// Days until the model should be re-validated, from the stability score.
    pub fn review_after_days(&self) -> u32 {
        if self.stability_score >= 80.0 {
            14
        } else if self.stability_score >= 60.0 {
            7
        } else {
            1
        }
    }
}

/// Drift monitor for a single (symbol, model-version) pair.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    symbol: String,
    model_version: String,
    config: DriftConfig,
    baseline: Vec<f64>,
    recent: VecDeque<f64>,
    direction_hits: VecDeque<bool>,
    accuracy_breach_streak: usize,
    status: DriftStatus,
    last_evaluated_at: Option<DateTime<Utc>>,
}

impl DriftDetector {
    /// Create a detector with its baseline residual window.
    ///
    /// Non-finite baseline values are discarded up front.
    pub fn new(
        symbol: impl Into<String>,
        model_version: impl Into<String>,
        baseline: Vec<f64>,
        config: DriftConfig,
    ) -> Self {
        let baseline: Vec<f64> = baseline.into_iter().filter(|r| r.is_finite()).collect();
        Self {
            symbol: symbol.into(),
            model_version: model_version.into(),
            config,
            baseline,
            recent: VecDeque::new(),
            direction_hits: VecDeque::new(),
            accuracy_breach_streak: 0,
            status: DriftStatus::Insufficient,
            last_evaluated_at: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn status(&self) -> DriftStatus {
        self.status
    }

    /// Install a fresh baseline after a retrain, clearing all drift state.
    ///
    /// This is the only way out of WARNING or CRITICAL.
    pub fn rebaseline(&mut self, baseline: Vec<f64>) {
        info!(
            symbol = %self.symbol,
            model_version = %self.model_version,
            samples = baseline.len(),
            "rebaselining drift detector"
        );
        self.baseline = baseline.into_iter().filter(|r| r.is_finite()).collect();
        self.recent.clear();
        self.direction_hits.clear();
        self.accuracy_breach_streak = 0;
        self.status = DriftStatus::Insufficient;
        self.last_evaluated_at = None;
    }

    /// Record whether the latest forecast called the direction correctly.
    ///
    /// Feeds the rolling-accuracy window consumed by the next evaluation.
    pub fn record_direction(&mut self, hit: bool) {
        self.direction_hits.push_back(hit);
        while self.direction_hits.len() > self.config.accuracy_window {
            self.direction_hits.pop_front();
        }
    }

    /// Streaming update: push one residual and re-evaluate.
    pub fn update(&mut self, residual: f64) -> DriftState {
        if !residual.is_finite() {
            warn!(symbol = %self.symbol, residual, "ignoring non-finite residual");
        } else {
            self.recent.push_back(residual);
            while self.recent.len() > self.config.recent_window {
                self.recent.pop_front();
            }
        }
        let recent: Vec<f64> = self.recent.iter().copied().collect();
        let ks = self.run_test(&recent, &self.baseline);
        self.finish(ks, self.baseline.len(), recent.len())
    }

    /// Batch evaluation of explicit residual samples.
    ///
    /// Uses the caller's slices for the KS comparison but carries the
    /// detector's rolling accuracy, breach streak, and status ratchet.
    pub fn evaluate(&mut self, recent: &[f64], baseline: &[f64]) -> DriftState {
        let ks = self.run_test(recent, baseline);
        self.finish(ks, baseline.len(), recent.len())
    }

    fn run_test(&self, recent: &[f64], baseline: &[f64]) -> Option<KsTest> {
        if recent.len() < self.config.min_samples || baseline.len() < self.config.min_samples {
            return None;
        }
        ks_two_sample(baseline, recent)
    }

    fn rolling_accuracy(&self) -> Option<f64> {
        if self.direction_hits.len() < self.config.accuracy_window {
            return None;
        }
        let hits = self.direction_hits.iter().filter(|&&h| h).count();
        Some(hits as f64 / self.direction_hits.len() as f64)
    }

    fn finish(
        &mut self,
        ks: Option<KsTest>,
        baseline_samples: usize,
        recent_samples: usize,
    ) -> DriftState {
        let rolling_accuracy = self.rolling_accuracy();

        // The streak counts consecutive evaluations, not consecutive misses.
        if let Some(acc) = rolling_accuracy {
            if acc < self.config.accuracy_floor {
                self.accuracy_breach_streak += 1;
            } else {
                self.accuracy_breach_streak = 0;
            }
        }

        let fresh = match &ks {
            None => DriftStatus::Insufficient,
            Some(t) => {
                if t.p_value <= self.config.critical_alpha
                    || self.accuracy_breach_streak >= self.config.breach_limit
                {
                    DriftStatus::Critical
                } else if t.p_value <= self.config.ks_alpha || self.accuracy_breach_streak > 0 {
                    DriftStatus::Warning
                } else {
                    DriftStatus::Stable
                }
            }
        };

        let previous = self.status;
        self.status = previous.max(fresh);
        if self.status != previous {
            if self.status >= DriftStatus::Warning {
                warn!(
                    symbol = %self.symbol,
                    model_version = %self.model_version,
                    from = %previous,
                    to = %self.status,
                    p_value = ks.map(|t| t.p_value),
                    breach_streak = self.accuracy_breach_streak,
                    "drift status escalated"
                );
            } else {
                info!(
                    symbol = %self.symbol,
                    from = %previous,
                    to = %self.status,
                    "drift status changed"
                );
            }
        }

        let retrain_recommended = ks.map(|t| t.p_value <= self.config.ks_alpha).unwrap_or(false)
            || self.accuracy_breach_streak >= self.config.breach_limit;

        let now = Utc::now();
        self.last_evaluated_at = Some(now);

        DriftState {
            status: self.status,
            ks,
            rolling_accuracy,
            accuracy_breach_streak: self.accuracy_breach_streak,
            stability_score: self.stability_score(ks, rolling_accuracy),
            retrain_recommended,
            baseline_samples,
            recent_samples,
            last_evaluated_at: now,
        }
    }

    /// Composite health score: 0.6 weight on the KS p-value, 0.4 on rolling
    /// accuracy relative to the healthy baseline. Monotonic in both inputs.
    fn stability_score(&self, ks: Option<KsTest>, rolling_accuracy: Option<f64>) -> f64 {
        let Some(t) = ks else {
            return 0.0;
        };
        let p_part = (t.p_value * 100.0).min(100.0);
        let acc_part = match rolling_accuracy {
            Some(acc) => (acc / self.config.baseline_accuracy * 100.0).min(100.0),
            // No direction feed yet — no evidence of decay.
            None => 100.0,
        };
        0.6 * p_part + 0.4 * acc_part
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual_grid(n: usize, offset: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 / n as f64 + offset).collect()
    }

    fn detector_with_baseline(n: usize) -> DriftDetector {
        DriftDetector::new("TEST", "v1", residual_grid(n, 0.0), DriftConfig::default())
    }

    // ── Sample gating ──

    #[test]
    fn fresh_detector_is_insufficient() {
        let mut det = detector_with_baseline(100);
        let state = det.update(0.1);
        assert_eq!(state.status, DriftStatus::Insufficient);
        assert!(state.ks.is_none());
        assert!(!state.retrain_recommended);
        assert_eq!(state.stability_score, 0.0);
        assert_eq!(state.review_after_days(), 1);
    }

    #[test]
    fn short_baseline_is_insufficient() {
        let mut det = detector_with_baseline(5);
        for r in residual_grid(30, 0.0) {
            det.update(r);
        }
        assert_eq!(det.status(), DriftStatus::Insufficient);
    }

    // ── KS-driven status ──

    #[test]
    fn matching_distribution_is_stable() {
        let mut det = detector_with_baseline(100);
        let mut last = None;
        for r in residual_grid(30, 0.0) {
            last = Some(det.update(r));
        }
        let state = last.unwrap();
        assert_eq!(state.status, DriftStatus::Stable);
        let ks = state.ks.unwrap();
        assert!(ks.p_value > 0.05);
        assert!(!state.retrain_recommended);
        assert!(state.stability_score >= 60.0);
    }

    #[test]
    fn shifted_distribution_goes_critical() {
        let mut det = detector_with_baseline(100);
        let mut last = None;
        for r in residual_grid(30, 10.0) {
            last = Some(det.update(r));
        }
        let state = last.unwrap();
        assert_eq!(state.status, DriftStatus::Critical);
        assert!(state.ks.unwrap().p_value <= 0.01);
        assert!(state.retrain_recommended);
        assert_eq!(state.review_after_days(), 1);
    }

    #[test]
    fn moderate_shift_warns() {
        // Aligned grids shifted by 21 steps of 0.01 give D = 0.21 exactly,
        // which at 100 samples per side lands between the two alpha levels.
        let mut det = detector_with_baseline(100);
        let state = det.evaluate(&residual_grid(100, 0.21), &residual_grid(100, 0.0));
        assert_eq!(state.status, DriftStatus::Warning);
        let p = state.ks.unwrap().p_value;
        assert!(p > 0.01 && p <= 0.05, "p = {p}");
        assert!(state.retrain_recommended);
    }

    #[test]
    fn evaluate_ignores_stored_windows() {
        let mut det = detector_with_baseline(100);
        let state = det.evaluate(&residual_grid(50, 0.0), &residual_grid(50, 0.0));
        assert_eq!(state.status, DriftStatus::Stable);
        assert_eq!(state.baseline_samples, 50);
        assert_eq!(state.recent_samples, 50);
    }

    // ── Ratchet ──

    #[test]
    fn status_never_silently_recovers() {
        let mut det = detector_with_baseline(100);
        let first = det.evaluate(&residual_grid(100, 0.21), &residual_grid(100, 0.0));
        assert_eq!(first.status, DriftStatus::Warning);

        // A clean sample afterwards: the flag stays up even though the
        // fresh evidence no longer recommends a retrain.
        let second = det.evaluate(&residual_grid(100, 0.0), &residual_grid(100, 0.0));
        assert_eq!(second.status, DriftStatus::Warning);
        assert!(!second.retrain_recommended);
    }

    #[test]
    fn rebaseline_clears_the_ratchet() {
        let mut det = detector_with_baseline(100);
        for r in residual_grid(30, 10.0) {
            det.update(r);
        }
        assert_eq!(det.status(), DriftStatus::Critical);

        det.rebaseline(residual_grid(100, 10.0));
        assert_eq!(det.status(), DriftStatus::Insufficient);

        // The shifted values now match the new baseline: full recovery.
        let mut last = None;
        for r in residual_grid(30, 10.0) {
            last = Some(det.update(r));
        }
        assert_eq!(last.unwrap().status, DriftStatus::Stable);
    }

    // ── Accuracy decay ──

    #[test]
    fn accuracy_breach_streak_escalates() {
        let mut det = detector_with_baseline(100);
        // Fill the recent window with matching residuals first.
        for r in residual_grid(25, 0.0) {
            det.update(r);
        }
        assert_eq!(det.status(), DriftStatus::Stable);

        // Seven straight misses fill the accuracy window at 0.0.
        for _ in 0..7 {
            det.record_direction(false);
        }
        let first = det.update(0.5);
        assert_eq!(first.accuracy_breach_streak, 1);
        assert_eq!(first.status, DriftStatus::Warning);
        assert!(!first.retrain_recommended);

        let second = det.update(0.5);
        assert_eq!(second.accuracy_breach_streak, 2);

        let third = det.update(0.5);
        assert_eq!(third.accuracy_breach_streak, 3);
        assert_eq!(third.status, DriftStatus::Critical);
        assert!(third.retrain_recommended);
    }

    #[test]
    fn healthy_accuracy_resets_the_streak() {
        let mut det = detector_with_baseline(100);
        for r in residual_grid(25, 0.0) {
            det.update(r);
        }
        for _ in 0..7 {
            det.record_direction(false);
        }
        let breached = det.update(0.5);
        assert_eq!(breached.accuracy_breach_streak, 1);

        // Window slides to 6/7 hits: back above the floor.
        for _ in 0..6 {
            det.record_direction(true);
        }
        let recovered = det.update(0.5);
        assert_eq!(recovered.accuracy_breach_streak, 0);
        // The ratchet still holds the earlier WARNING.
        assert_eq!(recovered.status, DriftStatus::Warning);
    }

    #[test]
    fn accuracy_window_is_rolling() {
        let mut det = detector_with_baseline(100);
        for r in residual_grid(25, 0.0) {
            det.update(r);
        }
        // Seven misses followed by seven hits: only the hits remain.
        for _ in 0..7 {
            det.record_direction(false);
        }
        for _ in 0..7 {
            det.record_direction(true);
        }
        let state = det.update(0.5);
        assert_eq!(state.rolling_accuracy, Some(1.0));
        assert_eq!(state.accuracy_breach_streak, 0);
        assert_eq!(state.status, DriftStatus::Stable);
    }

    #[test]
    fn partial_accuracy_window_is_none() {
        let mut det = detector_with_baseline(100);
        det.record_direction(true);
        det.record_direction(false);
        let state = det.update(0.1);
        assert_eq!(state.rolling_accuracy, None);
        assert_eq!(state.accuracy_breach_streak, 0);
    }

    // ── Score and schedule ──

    #[test]
    fn stability_score_monotone_in_p() {
        let mut near = detector_with_baseline(100);
        let mut far = detector_with_baseline(100);
        let s_near = near.evaluate(&residual_grid(100, 0.05), &residual_grid(100, 0.0));
        let s_far = far.evaluate(&residual_grid(100, 0.40), &residual_grid(100, 0.0));
        assert!(s_near.stability_score > s_far.stability_score);
    }

    #[test]
    fn review_schedule_bands() {
        let mut det = detector_with_baseline(100);
        let healthy = det.evaluate(&residual_grid(100, 0.0), &residual_grid(100, 0.0));
        assert!(healthy.stability_score >= 80.0);
        assert_eq!(healthy.review_after_days(), 14);

        let mut state = healthy;
        state.stability_score = 65.0;
        assert_eq!(state.review_after_days(), 7);
        state.stability_score = 20.0;
        assert_eq!(state.review_after_days(), 1);
    }

    #[test]
    fn non_finite_residuals_are_ignored() {
        let mut det = detector_with_baseline(100);
        for r in residual_grid(30, 0.0) {
            det.update(r);
        }
        let before = det.update(0.5).recent_samples;
        let state = det.update(f64::NAN);
        assert_eq!(state.recent_samples, before);
        assert_eq!(state.status, DriftStatus::Stable);
    }
}
