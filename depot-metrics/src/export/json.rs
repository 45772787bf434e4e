//! JSON export for reports
//!
//! Writes any serializable report in structured JSON, for programmatic consumption
//! and external plotting tools.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::MetricsError;
use crate::export::MetricsExporter;

/// JSON exporter writing to a file
#[derive(Debug)]
pub struct JsonExporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `pretty` - Whether to pretty-print the JSON (adds whitespace for readability)
    pub fn new(path: &Path, pretty: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            pretty,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serialize `report` to a JSON string.
pub fn to_json_string<T: Serialize + ?Sized>(report: &T, pretty: bool) -> Result<String, MetricsError> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(json)
}

impl MetricsExporter for JsonExporter {
    fn export<T: Serialize + ?Sized>(&self, report: &T) -> Result<(), MetricsError> {
        let json = to_json_string(report, self.pretty)?;

        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        info!(path = %self.path.display(), bytes = json.len(), "Report exported");
        Ok(())
    }
}
