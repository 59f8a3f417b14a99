//! Domain types for the validation engine.

pub mod bar;
pub mod estimate;
pub mod forecast;
pub mod series;

pub use bar::FeatureBar;
pub use estimate::{ModelEstimate, ModelFamily};
pub use forecast::{EnsembleForecast, ModelContribution, VolRegime};
pub use series::{HistoricalSeries, SeriesError};

/// Symbol type alias
pub type Symbol = String;
