//! Error types for metrics collection and export

use thiserror::Error;

/// Errors related to metrics collection
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Histogram error: {0}")]
    Histogram(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
