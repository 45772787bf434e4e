//! Simulation time management

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use crate::error::SimError;

/// A point on the simulated clock.
///
/// `SimTime` is a non-negative, finite real number of abstract time units. The
/// warehouse scenario reads them as minutes, but the engine attaches no unit to
/// them. Every constructed value is finite and non-negative, which is what makes
/// the total order below sound.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(into = "f64")]
pub struct SimTime(f64);

impl SimTime {
    /// The simulation start.
    pub const fn zero() -> Self {
        SimTime(0.0)
    }

    /// Create a `SimTime`, rejecting negative, infinite and NaN values.
    pub fn new(value: f64) -> Result<Self, SimError> {
        if !value.is_finite() || value < 0.0 {
            return Err(SimError::InvalidTime { value });
        }
        // Normalizes -0.0 so equality and ordering agree.
        Ok(SimTime(value + 0.0))
    }

    /// Raw value in simulation units.
    pub const fn as_f64(&self) -> f64 {
        self.0
    }

    /// Time elapsed since `earlier`, saturating at zero.
    pub fn duration_since(&self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    /// The point `duration` units after this one.
    ///
    /// Fails with [`SimError::InvalidDuration`] if `duration` is negative or not finite.
    pub fn checked_add(&self, duration: f64) -> Result<SimTime, SimError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::InvalidDuration { duration });
        }
        SimTime::new(self.0 + duration)
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    /// # Panics
    ///
    /// Panics if the result is negative or not finite; use
    /// [`SimTime::checked_add`] for a fallible version.
    fn add(self, rhs: f64) -> Self::Output {
        SimTime::from(self.0 + rhs)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = f64;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        SimTime::new(value).map_err(serde::de::Error::custom)
    }
}

impl From<SimTime> for f64 {
    fn from(time: SimTime) -> Self {
        time.0
    }
}

impl From<f64> for SimTime {
    /// Convert from raw simulation units.
    ///
    /// # Examples
    /// ```
    /// # use depot_core::SimTime;
    /// let time = SimTime::from(1.5);
    /// assert_eq!(time.as_f64(), 1.5);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the input is negative, infinite, or NaN.
    fn from(value: f64) -> Self {
        if !value.is_finite() {
            panic!("SimTime cannot be created from non-finite value: {value}");
        }
        if value < 0.0 {
            panic!("SimTime cannot be negative: {value}");
        }
        SimTime(value + 0.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
