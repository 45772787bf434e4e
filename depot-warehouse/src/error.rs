use depot_core::SimError;
use depot_metrics::MetricsError;
use thiserror::Error;

/// Errors surfaced by the warehouse scenario.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("failed reading configuration file: {0}")]
    ConfigRead(#[source] std::io::Error),

    #[error("failed decoding configuration: {0}")]
    ConfigDecode(#[from] serde_json::Error),
}
