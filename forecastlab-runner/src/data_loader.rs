//! CSV bar loading and synthetic series generation.
//!
//! Reads daily OHLCV files with a header row; every numeric column beyond
//! the required six is carried onto the bar as a named feature. Synthetic
//! series are seeded from the symbol name, so validation runs on fake data
//! stay reproducible and are clearly labeled as such by the caller.

use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

use forecastlab_core::domain::{FeatureBar, HistoricalSeries, SeriesError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("'{path}' is missing required column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("{path}: row {row}: column '{column}' has unparseable value '{value}'")]
    InvalidField {
        path: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Load one symbol's bar history from a CSV file.
///
/// Requires `date,open,high,low,close,volume` columns in any order, case
/// insensitive. Remaining columns become named features (headers are
/// lowercased, spaces become underscores, blank cells are skipped). The
/// result passes the full series contract or the load fails.
pub fn load_csv(path: &Path, symbol: &str) -> Result<HistoricalSeries, LoadError> {
    let path_str = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase().replace(' ', "_"))
        .collect();
    let find = |name: &str| -> Result<usize, LoadError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoadError::MissingColumn {
                path: path_str.clone(),
                column: name.to_string(),
            })
    };
    let date_col = find("date")?;
    let open_col = find("open")?;
    let high_col = find("high")?;
    let low_col = find("low")?;
    let close_col = find("close")?;
    let volume_col = find("volume")?;

    let ohlcv = [date_col, open_col, high_col, low_col, close_col, volume_col];
    let mut feature_cols: Vec<(usize, String)> = Vec::new();
    for (i, name) in headers.iter().enumerate() {
        if !ohlcv.contains(&i) {
            feature_cols.push((i, name.clone()));
        }
    }

    let mut bars = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // 1-based file row, counting the header line.
        let row = idx + 2;

        let parse_f64 = |col: usize, column: &str| -> Result<f64, LoadError> {
            let raw = record.get(col).unwrap_or("");
            raw.parse::<f64>().map_err(|_| LoadError::InvalidField {
                path: path_str.clone(),
                row,
                column: column.to_string(),
                value: raw.to_string(),
            })
        };

        let raw_date = record.get(date_col).unwrap_or("");
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            LoadError::InvalidField {
                path: path_str.clone(),
                row,
                column: "date".to_string(),
                value: raw_date.to_string(),
            }
        })?;
        let volume = parse_f64(volume_col, "volume")?.max(0.0) as u64;

        let mut bar = FeatureBar::from_ohlcv(
            date,
            parse_f64(open_col, "open")?,
            parse_f64(high_col, "high")?,
            parse_f64(low_col, "low")?,
            parse_f64(close_col, "close")?,
            volume,
        );
        for (col, name) in &feature_cols {
            let raw = record.get(*col).unwrap_or("");
            if raw.is_empty() {
                continue;
            }
            let value = parse_f64(*col, name)?;
            bar.features.insert(name.clone(), value);
        }
        bars.push(bar);
    }

    let series = HistoricalSeries::new(symbol, bars)?;
    info!(symbol, bars = series.len(), path = %path_str, "loaded bar history");
    Ok(series)
}

/// Symbol implied by a file name: `data/aapl.csv` → `AAPL`.
pub fn symbol_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_ascii_uppercase()
}

/// Deterministic synthetic random walk for development and smoke tests.
///
/// Seeded from the symbol name: the same symbol always produces the same
/// series. Weekends are skipped to mimic a trading calendar.
pub fn generate_synthetic_series(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HistoricalSeries, LoadError> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(FeatureBar::from_ohlcv(current, open, high, low, close, volume));
        price = close;
        current += chrono::Duration::days(1);
    }

    Ok(HistoricalSeries::new(symbol, bars)?)
}
