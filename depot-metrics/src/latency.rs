//! Duration summaries backed by HdrHistogram
//!
//! Count, mean, min and max are exact. Percentiles come from the histogram, which keeps
//! three significant digits of values recorded in thousandths of a time unit.

use hdrhistogram::Histogram as HdrHistogram;
use serde::Serialize;

use crate::error::MetricsError;

/// Values are stored in thousandths of a simulation unit.
const SCALE: f64 = 1000.0;
const SIGNIFICANT_FIGURES: u8 = 3;

/// Summary statistics of a set of durations, in simulation units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Accumulates durations (waiting, processing, total time) for one stage.
#[derive(Debug, Clone)]
pub struct LatencySummary {
    histogram: HdrHistogram<u64>,
    count: u64,
    sum: f64,
    sum_of_squares: f64,
    min: f64,
    max: f64,
}

impl LatencySummary {
    pub fn new() -> Result<Self, MetricsError> {
        let histogram = HdrHistogram::<u64>::new(SIGNIFICANT_FIGURES)
            .map_err(|e| MetricsError::Histogram(format!("failed to create histogram: {e}")))?;
        Ok(Self {
            histogram,
            count: 0,
            sum: 0.0,
            sum_of_squares: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    /// Record one duration. Negative and non-finite values are rejected.
    pub fn record(&mut self, value: f64) -> Result<(), MetricsError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MetricsError::InvalidMetric(format!(
                "duration must be finite and non-negative, got {value}"
            )));
        }
        self.histogram
            .record((value * SCALE).round() as u64)
            .map_err(|e| MetricsError::Histogram(format!("failed to record {value}: {e}")))?;
        self.count += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Approximate value at `quantile` (0.0 to 1.0).
    pub fn quantile(&self, quantile: f64) -> Option<f64> {
        (self.count > 0)
            .then(|| self.histogram.value_at_quantile(quantile) as f64 / SCALE)
            .map(|value| value.clamp(self.min, self.max))
    }

    /// Snapshot of the statistics. All zero when nothing was recorded.
    pub fn stats(&self) -> LatencyStats {
        let Some(mean) = self.mean() else {
            return LatencyStats::default();
        };
        let variance = (self.sum_of_squares / self.count as f64 - mean * mean).max(0.0);
        LatencyStats {
            count: self.count,
            mean,
            std_dev: variance.sqrt(),
            min: self.min,
            max: self.max,
            p50: self.quantile(0.5).unwrap_or(mean),
            p95: self.quantile(0.95).unwrap_or(mean),
            p99: self.quantile(0.99).unwrap_or(mean),
        }
    }
}

impl std::fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={} mean={:.2} min={:.2} max={:.2} p50={:.2} p95={:.2} p99={:.2}",
            self.count, self.mean, self.min, self.max, self.p50, self.p95, self.p99
        )
    }
}
