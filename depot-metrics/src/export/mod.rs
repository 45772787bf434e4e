//! Export functionality for simulation reports

pub mod json;

use std::path::Path;

use serde::Serialize;

use crate::error::MetricsError;

/// Trait for exporting reports to different formats
pub trait MetricsExporter {
    /// Export `report` to the configured destination
    fn export<T: Serialize + ?Sized>(&self, report: &T) -> Result<(), MetricsError>;
}

/// Export a report to JSON format
///
/// # Example
/// ```no_run
/// use depot_metrics::export::export_json;
///
/// let totals = vec![("orders", 12), ("deliveries", 11)];
/// export_json(&totals, "results/report.json", true).unwrap();
/// ```
pub fn export_json<T: Serialize + ?Sized>(
    report: &T,
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<(), MetricsError> {
    let exporter = json::JsonExporter::new(path.as_ref(), pretty);
    exporter.export(report)
}
