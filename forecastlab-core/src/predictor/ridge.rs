//! Ridge regression adapter — the stable, regression-family model.
//!
//! Regresses the next close on a small design built from the prefix tail:
//! intercept, last close, the two most recent one-step changes, and every
//! named feature on the bar. Solved in closed form via the normal equations
//! with an L2 penalty; no iterative optimizer, no randomness.

use super::{ModelFitError, PredictorAdapter};
use crate::domain::{FeatureBar, ModelEstimate, ModelFamily};

const MODEL_NAME: &str = "ridge";

/// Price-derived regressors per row, excluding the intercept: last close and
/// two lagged one-step changes.
const PRICE_REGRESSORS: usize = 3;

/// Rows needed beyond the training window to form lagged regressors and the
/// final target.
const LAG_ROWS: usize = 3;

#[derive(Debug, Clone)]
struct FittedRidge {
    /// Intercept first, then price regressors, then features in name order.
    coefficients: Vec<f64>,
    feature_names: Vec<String>,
    residual_std: f64,
}

/// Closed-form ridge regression on price lags plus the bar feature vector.
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    window: usize,
    lambda: f64,
    fitted: Option<FittedRidge>,
}

impl RidgeRegression {
    /// `window` training rows, L2 strength `lambda`. The window is floored
    /// at 8 rows; below that the normal equations are too thin to trust.
    pub fn new(window: usize, lambda: f64) -> Self {
        Self {
            window: window.max(8),
            lambda: lambda.max(0.0),
            fitted: None,
        }
    }

    /// Regressor row for the bar at `idx` (requires `idx >= 2`).
    fn design_row(
        &self,
        bars: &[FeatureBar],
        idx: usize,
        feature_names: &[String],
    ) -> Result<Vec<f64>, ModelFitError> {
        let mut row = Vec::with_capacity(1 + PRICE_REGRESSORS + feature_names.len());
        row.push(1.0);
        row.push(bars[idx].close);
        row.push(bars[idx].close - bars[idx - 1].close);
        row.push(bars[idx - 1].close - bars[idx - 2].close);
        for name in feature_names {
            let value = bars[idx]
                .feature(name)
                .ok_or_else(|| ModelFitError::MissingFeature {
                    model: MODEL_NAME.to_string(),
                    feature: name.clone(),
                    date: bars[idx].date,
                })?;
            row.push(value);
        }
        Ok(row)
    }
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(40, 1.0)
    }
}

impl PredictorAdapter for RidgeRegression {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Stable
    }

    fn min_history(&self) -> usize {
        self.window + LAG_ROWS
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

        // Feature layout is fixed by the newest bar; every training row must
        // carry the same names.
        let feature_names: Vec<String> = history[n - 1].features.keys().cloned().collect();
        let k = 1 + PRICE_REGRESSORS + feature_names.len();

        // Training rows t in [n-1-window, n-2]: regressors at t, target close[t+1].
        let first_t = n - 1 - self.window;
        let mut xs: Vec<Vec<f64>> = Vec::with_capacity(self.window);
        let mut ys: Vec<f64> = Vec::with_capacity(self.window);
        for t in first_t..n - 1 {
            xs.push(self.design_row(history, t, &feature_names)?);
            ys.push(history[t + 1].close);
        }

        // Normal equations: (XᵀX + λI')β = Xᵀy, intercept unpenalized.
        let mut a = vec![vec![0.0; k]; k];
        let mut b = vec![0.0; k];
        for (x, &y) in xs.iter().zip(ys.iter()) {
            for i in 0..k {
                b[i] += x[i] * y;
                for j in 0..k {
                    a[i][j] += x[i] * x[j];
                }
            }
        }
        for (i, row) in a.iter_mut().enumerate().skip(1) {
            row[i] += self.lambda;
        }

        let coefficients =
            solve_linear(a, b).ok_or_else(|| ModelFitError::NumericalInstability {
                model: MODEL_NAME.to_string(),
                detail: "singular normal equations".to_string(),
            })?;

        let mut sq_sum = 0.0;
        for (x, &y) in xs.iter().zip(ys.iter()) {
            let pred: f64 = x.iter().zip(coefficients.iter()).map(|(xi, c)| xi * c).sum();
            sq_sum += (y - pred).powi(2);
        }
        let dof = (xs.len() as f64 - 1.0).max(1.0);
        let residual_std = (sq_sum / dof).sqrt();

        if !coefficients.iter().all(|c| c.is_finite()) || !residual_std.is_finite() {
            return Err(ModelFitError::NumericalInstability {
                model: MODEL_NAME.to_string(),
                detail: "non-finite solution".to_string(),
            });
        }

        self.fitted = Some(FittedRidge {
            coefficients,
            feature_names,
            residual_std,
        });
        Ok(())
    }

    fn predict(&self, history: &[FeatureBar]) -> Result<ModelEstimate, ModelFitError> {
        let fitted = self.fitted.as_ref().ok_or_else(|| ModelFitError::Unfitted {
            model: MODEL_NAME.to_string(),
        })?;
        let n = history.len();
        if n < LAG_ROWS {
            return Err(ModelFitError::InsufficientData {
                model: MODEL_NAME.to_string(),
                needed: LAG_ROWS,
                got: n,
            });
        }
        let x = self.design_row(history, n - 1, &fitted.feature_names)?;
        let value: f64 = x
            .iter()
            .zip(fitted.coefficients.iter())
            .map(|(xi, c)| xi * c)
            .sum();
        Ok(
            ModelEstimate::new(MODEL_NAME, ModelFamily::Stable, value)
                .with_variance(fitted.residual_std.powi(2)),
        )
    }
}

/// Solve `A·x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot collapses below 1e-12 (singular system).
/// Small dense systems only; the design here is a handful of regressors.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_abs = a[col][col].abs();
        for row in col + 1..n {
            let abs = a[row][col].abs();
            if abs > pivot_abs {
                pivot_row = row;
                pivot_abs = abs;
            }
        }
        if pivot_abs < 1e-12 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for col in (0..n).rev() {
        let mut sum = b[col];
        for k in col + 1..n {
            sum -= a[col][k] * x[k];
        }
        x[col] = sum / a[col][col];
    }
    Some(x)
}
