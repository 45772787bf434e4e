//! Statistics for depot simulations
//!
//! This crate turns what the engine records (resource occupancy samples, per-request
//! timestamps) into summary statistics, and exports reports as JSON.

pub mod error;
pub mod export;
pub mod latency;
pub mod time_series;

pub use error::MetricsError;
pub use export::json::{to_json_string, JsonExporter};
pub use export::{export_json, MetricsExporter};
pub use latency::{LatencyStats, LatencySummary};
pub use time_series::{SeriesSummary, TimeSeriesPoint, TimeWeightedSeries};
