//! Error types for the simulation engine

use thiserror::Error;

use crate::types::{ProcessId, RequestId};

/// Top-level error type for simulation operations.
///
/// `InvalidDuration`, `InvalidCapacity` and `InvalidRelease` are usage errors and are
/// returned at the call site that caused them. `ProcessFailure` is what a failed process
/// looks like to whoever observes it: a parent awaiting its handle, an `all_of` join, or
/// the driver calling [`Environment::run`](crate::Environment::run) when nobody was
/// observing it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Invalid duration {duration}: expected a finite, non-negative value")]
    InvalidDuration { duration: f64 },

    #[error("Invalid time {value}: expected a finite, non-negative value")]
    InvalidTime { value: f64 },

    #[error("Invalid capacity for resource '{resource}': {capacity} (must be at least 1)")]
    InvalidCapacity { resource: String, capacity: usize },

    #[error("Invalid release of {request} on resource '{resource}': {reason}")]
    InvalidRelease {
        resource: String,
        request: RequestId,
        reason: &'static str,
    },

    #[error("Process '{process}' failed: {source}")]
    ProcessFailure {
        process: String,
        #[source]
        source: Box<SimError>,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Unknown process: {0}")]
    UnknownProcess(ProcessId),

    #[error("Cannot run until {until}: simulation clock is already at {now}")]
    InvalidUntil { until: f64, now: f64 },

    #[error("Event scheduling failed: cannot schedule event at {time} in the past (now {now})")]
    ScheduleInPast { time: f64, now: f64 },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl SimError {
    /// Wrap `source` as the failure of the process called `process`.
    pub fn process_failure(process: impl Into<String>, source: SimError) -> Self {
        SimError::ProcessFailure {
            process: process.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error of a chain of process failures.
    pub fn root_cause(&self) -> &SimError {
        match self {
            SimError::ProcessFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_nested_failures() {
        let inner = SimError::Process("truck broke down".to_string());
        let err = SimError::process_failure(
            "Order 1",
            SimError::process_failure("Order 1 / sector 2", inner.clone()),
        );
        assert_eq!(err.root_cause(), &inner);
        assert!(err.to_string().contains("Order 1"));
    }

    #[test]
    fn test_display_messages() {
        let err = SimError::InvalidDuration { duration: -2.0 };
        assert_eq!(
            err.to_string(),
            "Invalid duration -2: expected a finite, non-negative value"
        );
        let err = SimError::InvalidCapacity {
            resource: "trucks".to_string(),
            capacity: 0,
        };
        assert!(err.to_string().contains("trucks"));
    }
}
