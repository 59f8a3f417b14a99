//! HistoricalSeries — validated, time-ordered bar history for one symbol.

use super::bar::FeatureBar;
use super::Symbol;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures when constructing a series.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("series for '{symbol}' is empty")]
    Empty { symbol: String },

    #[error("series for '{symbol}' has out-of-order dates at row {index}: {prev} then {next}")]
    OutOfOrder {
        symbol: String,
        index: usize,
        prev: chrono::NaiveDate,
        next: chrono::NaiveDate,
    },

    #[error("series for '{symbol}' has duplicate date {date} at row {index}")]
    DuplicateDate {
        symbol: String,
        index: usize,
        date: chrono::NaiveDate,
    },

    #[error("series for '{symbol}' has an invalid bar at row {index} ({date})")]
    InsaneBar {
        symbol: String,
        index: usize,
        date: chrono::NaiveDate,
    },
}

/// Time-ordered bar history for one symbol.
///
/// Construction enforces the ordering contract the whole engine relies on:
/// strictly increasing dates, no duplicates, every bar sane. Consumers only
/// ever read prefixes; nothing in the engine mutates a series after it is
/// built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalSeries {
    symbol: Symbol,
    bars: Vec<FeatureBar>,
}

impl HistoricalSeries {
    /// Validate and wrap a bar vector.
    pub fn new(symbol: impl Into<String>, bars: Vec<FeatureBar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(SeriesError::Empty { symbol });
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::InsaneBar {
                    symbol,
                    index: i,
                    date: bar.date,
                });
            }
            if i > 0 {
                let prev = bars[i - 1].date;
                if bar.date == prev {
                    return Err(SeriesError::DuplicateDate {
                        symbol,
                        index: i,
                        date: bar.date,
                    });
                }
                if bar.date < prev {
                    return Err(SeriesError::OutOfOrder {
                        symbol,
                        index: i,
                        prev,
                        next: bar.date,
                    });
                }
            }
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[FeatureBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Ordered prefix `[0, len)` — the only slicing the engine performs.
    /// Walk-forward fitting passes ever-growing prefixes so that no bar at
    /// or after the evaluation instant can leak into training.
    pub fn prefix(&self, len: usize) -> &[FeatureBar] {
        &self.bars[..len.min(self.bars.len())]
    }

    /// Closing prices in bar order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> FeatureBar {
        FeatureBar::from_ohlcv(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close,
            close * 1.01,
            close * 0.99,
            close,
            10_000,
        )
    }

    #[test]
    fn valid_series_constructs() {
        let s = HistoricalSeries::new("SPY", vec![bar(2, 100.0), bar(3, 101.0)]).unwrap();
        assert_eq!(s.symbol(), "SPY");
        assert_eq!(s.len(), 2);
        assert_eq!(s.closes(), vec![100.0, 101.0]);
    }

    #[test]
    fn empty_series_rejected() {
        let err = HistoricalSeries::new("SPY", vec![]).unwrap_err();
        assert!(matches!(err, SeriesError::Empty { .. }));
    }

    #[test]
    fn duplicate_date_rejected() {
        let err = HistoricalSeries::new("SPY", vec![bar(2, 100.0), bar(2, 101.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::DuplicateDate { index: 1, .. }));
    }

    #[test]
    fn out_of_order_rejected() {
        let err = HistoricalSeries::new("SPY", vec![bar(3, 100.0), bar(2, 101.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn insane_bar_rejected() {
        let mut bad = bar(2, 100.0);
        bad.high = 10.0; // below low
        let err = HistoricalSeries::new("SPY", vec![bad]).unwrap_err();
        assert!(matches!(err, SeriesError::InsaneBar { index: 0, .. }));
    }

    #[test]
    fn prefix_is_clamped() {
        let s = HistoricalSeries::new("SPY", vec![bar(2, 100.0), bar(3, 101.0)]).unwrap();
        assert_eq!(s.prefix(1).len(), 1);
        assert_eq!(s.prefix(99).len(), 2);
    }
}
