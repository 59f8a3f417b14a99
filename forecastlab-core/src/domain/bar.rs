//! FeatureBar — one observation day: OHLCV plus named indicator features.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Daily OHLCV bar enriched with the indicator columns the predictors consume.
///
/// The feature map is produced upstream by the indicator engine; the core
/// never computes indicators beyond realized volatility. Feature names are
/// free-form but must be identical across every bar of one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Named numeric features, e.g. "rsi_14", "macd", "vol_20d".
    /// BTreeMap keeps iteration (and anything hashed from it) deterministic.
    pub features: BTreeMap<String, f64>,
}

impl FeatureBar {
    /// Bar with empty feature map, for series that only carry prices.
    pub fn from_ohlcv(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            features: BTreeMap::new(),
        }
    }

    /// Look up a named feature value.
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    /// Basic OHLC sanity check: finite prices, high >= low, range contains
    /// open and close, strictly positive open/close.
    pub fn is_sane(&self) -> bool {
        let prices_finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite();
        prices_finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.features.values().all(|v| v.is_finite())
    }
}
