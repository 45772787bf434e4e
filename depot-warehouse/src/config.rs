//! Scenario parameters.
//!
//! Every field has a default, so `{}` is a complete configuration:
//!
//! ```
//! use depot_warehouse::WarehouseConfig;
//!
//! let config = WarehouseConfig::from_json_str(r#"{ "num_trucks": 4 }"#).unwrap();
//! assert_eq!(config.num_trucks, 4);
//! assert_eq!(config.num_sectors, 3);
//! ```

use std::fs;
use std::path::Path;

use depot_core::SimError;
use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;

/// Mean and standard deviation of a normally distributed duration, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeDistribution {
    pub mean: f64,
    #[serde(default)]
    pub std_dev: f64,
}

impl TimeDistribution {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    fn validate(&self, field: &str) -> Result<(), SimError> {
        if !self.mean.is_finite() || self.mean < 0.0 {
            return Err(SimError::Configuration(format!(
                "{field}.mean must be finite and non-negative, got {}",
                self.mean
            )));
        }
        if !self.std_dev.is_finite() || self.std_dev < 0.0 {
            return Err(SimError::Configuration(format!(
                "{field}.std_dev must be finite and non-negative, got {}",
                self.std_dev
            )));
        }
        Ok(())
    }
}

/// Parameters of one warehouse run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Seed of the single random stream every sample is drawn from.
    pub random_seed: u64,
    /// Trucks in the delivery area.
    pub num_trucks: usize,
    /// Employees working in parallel in each sector.
    pub num_employees: usize,
    pub num_sectors: usize,
    /// Time a truck needs for one delivery.
    pub delivery_time: TimeDistribution,
    /// Time an employee needs to prepare one order's share in a sector.
    pub processing_time: TimeDistribution,
    /// Mean time between order arrivals (exponentially distributed).
    pub order_interval: f64,
    /// Horizon of the run. `None` runs until every order is delivered, which requires
    /// `max_orders`.
    pub sim_time: Option<f64>,
    /// Stop generating orders after this many.
    pub max_orders: Option<usize>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            random_seed: 42,
            num_trucks: 2,
            num_employees: 1,
            num_sectors: 3,
            delivery_time: TimeDistribution::new(20.0, 0.0),
            processing_time: TimeDistribution::new(10.0, 2.0),
            order_interval: 5.0,
            sim_time: Some(30.0),
            max_orders: None,
        }
    }
}

impl WarehouseConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, WarehouseError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WarehouseError> {
        let json = fs::read_to_string(path).map_err(WarehouseError::ConfigRead)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        for (field, count) in [
            ("num_trucks", self.num_trucks),
            ("num_employees", self.num_employees),
            ("num_sectors", self.num_sectors),
        ] {
            if count == 0 {
                return Err(SimError::Configuration(format!("{field} must be at least 1")));
            }
        }
        self.delivery_time.validate("delivery_time")?;
        self.processing_time.validate("processing_time")?;
        if !self.order_interval.is_finite() || self.order_interval <= 0.0 {
            return Err(SimError::Configuration(format!(
                "order_interval must be finite and positive, got {}",
                self.order_interval
            )));
        }
        match self.sim_time {
            Some(horizon) if !horizon.is_finite() || horizon <= 0.0 => {
                Err(SimError::Configuration(format!(
                    "sim_time must be finite and positive, got {horizon}"
                )))
            }
            None if self.max_orders.is_none() => Err(SimError::Configuration(
                "a run without sim_time needs max_orders to terminate".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
