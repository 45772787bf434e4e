//! Time-weighted statistics over step functions
//!
//! Queue length and busy units only change at discrete instants and hold their value
//! in between. [`TimeWeightedSeries`] stores those change points and integrates the
//! resulting step function, which is how "average queue size" and "utilization over
//! time" are computed.

use depot_core::{ResourceSample, SimTime};
use serde::Serialize;

use crate::error::MetricsError;

/// Time-series data point with timestamp and value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: SimTime,
    pub value: f64,
}

/// Aggregates of a step function over `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub start: SimTime,
    pub end: SimTime,
    pub time_weighted_mean: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
    pub changes: usize,
}

/// A piecewise-constant signal, recorded at its change points.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeWeightedSeries {
    points: Vec<TimeSeriesPoint>,
}

impl TimeWeightedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units busy over time, from a resource's history.
    pub fn in_use(samples: &[ResourceSample]) -> Self {
        Self::from_samples(samples, |sample| sample.in_use as f64)
    }

    /// Fraction of capacity busy over time, from a resource's history.
    pub fn utilization(samples: &[ResourceSample], capacity: usize) -> Self {
        let capacity = capacity.max(1) as f64;
        Self::from_samples(samples, |sample| sample.in_use as f64 / capacity)
    }

    /// Queue length over time, from a resource's history.
    pub fn queue_size(samples: &[ResourceSample]) -> Self {
        Self::from_samples(samples, |sample| sample.queued as f64)
    }

    fn from_samples(samples: &[ResourceSample], value: impl Fn(&ResourceSample) -> f64) -> Self {
        let points = samples
            .iter()
            .map(|sample| TimeSeriesPoint {
                timestamp: sample.time,
                value: value(sample),
            })
            .collect();
        Self { points }
    }

    /// Record that the signal takes `value` from `timestamp` on.
    ///
    /// Timestamps must not decrease. Several points at the same instant are allowed;
    /// the last one wins.
    pub fn add_point(&mut self, timestamp: SimTime, value: f64) -> Result<(), MetricsError> {
        if !value.is_finite() {
            return Err(MetricsError::InvalidMetric(format!(
                "non-finite value {value} at {timestamp}"
            )));
        }
        if let Some(last) = self.points.last() {
            if timestamp < last.timestamp {
                return Err(MetricsError::InvalidMetric(format!(
                    "point at {timestamp} is earlier than the previous point at {}",
                    last.timestamp
                )));
            }
        }
        self.points.push(TimeSeriesPoint { timestamp, value });
        Ok(())
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Value in effect at `time`, if the signal started by then.
    pub fn value_at(&self, time: SimTime) -> Option<f64> {
        self.points
            .iter()
            .take_while(|point| point.timestamp <= time)
            .last()
            .map(|point| point.value)
    }

    /// Integral of the signal from its first point up to `end`.
    pub fn area_until(&self, end: SimTime) -> f64 {
        self.points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let until = self
                    .points
                    .get(i + 1)
                    .map_or(end, |next| next.timestamp)
                    .min(end);
                until.duration_since(point.timestamp) * point.value
            })
            .sum()
    }

    /// Mean of the signal weighted by how long each value held, from the first point up
    /// to `end`. A zero-length window yields the last value at that instant.
    pub fn time_weighted_mean(&self, end: SimTime) -> Option<f64> {
        let first = self.points.first()?;
        let span = end.duration_since(first.timestamp);
        if span == 0.0 {
            return self.value_at(end);
        }
        Some(self.area_until(end) / span)
    }

    /// Summarize the signal up to `end`, ignoring points after it.
    pub fn summary(&self, end: SimTime) -> Option<SeriesSummary> {
        let first = self.points.first()?;
        let in_window: Vec<f64> = self
            .points
            .iter()
            .filter(|point| point.timestamp <= end)
            .map(|point| point.value)
            .collect();
        let last = *in_window.last()?;
        Some(SeriesSummary {
            start: first.timestamp,
            end,
            time_weighted_mean: self.time_weighted_mean(end).unwrap_or(last),
            min: in_window.iter().copied().fold(f64::INFINITY, f64::min),
            max: in_window.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            last,
            changes: in_window.len(),
        })
    }
}
