//! Distribution traits and implementations for order arrivals and service times
//!
//! Every random draw of a run comes from one [`SharedRng`], so a run is reproducible
//! from its seed no matter how many sectors or orders it involves.

use std::cell::RefCell;
use std::rc::Rc;

use depot_core::SimError;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Exp, Normal};

/// A cloneable handle to a single seeded random stream.
#[derive(Clone, Debug)]
pub struct SharedRng {
    rng: Rc<RefCell<ChaCha8Rng>>,
}

impl SharedRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Draw one value from `distribution`.
    pub fn sample<T, D: rand_distr::Distribution<T>>(&self, distribution: D) -> T {
        self.rng.borrow_mut().sample(distribution)
    }

    /// A random, non-empty subset of `0..count`, in random order.
    ///
    /// The subset size is uniform over `1..=count`.
    pub fn sample_subset(&self, count: usize) -> Vec<usize> {
        if count == 0 {
            return Vec::new();
        }
        let mut rng = self.rng.borrow_mut();
        let amount = rng.gen_range(1..=count);
        index::sample(&mut *rng, count, amount).into_vec()
    }
}

/// Trait for generating arrival patterns
pub trait ArrivalPattern {
    /// Time to wait before the next arrival.
    fn next_arrival_time(&mut self) -> f64;
}

/// Trait for sampling service times from a distribution
pub trait ServiceTimeDistribution {
    /// Sample the time one unit of work takes. Never negative.
    fn sample(&mut self) -> f64;

    fn mean_service_time(&self) -> f64;
}

/// Simple constant arrival pattern
#[derive(Debug, Clone)]
pub struct ConstantArrivalPattern {
    inter_arrival_time: f64,
}

impl ConstantArrivalPattern {
    pub fn new(inter_arrival_time: f64) -> Result<Self, SimError> {
        if !inter_arrival_time.is_finite() || inter_arrival_time < 0.0 {
            return Err(SimError::InvalidDuration {
                duration: inter_arrival_time,
            });
        }
        Ok(Self { inter_arrival_time })
    }
}

impl ArrivalPattern for ConstantArrivalPattern {
    fn next_arrival_time(&mut self) -> f64 {
        self.inter_arrival_time
    }
}

/// Poisson arrival pattern
///
/// Inter-arrival times are exponentially distributed with the given mean.
#[derive(Debug, Clone)]
pub struct PoissonArrivals {
    mean_interval: f64,
    rng: SharedRng,
    exp_dist: Exp<f64>,
}

impl PoissonArrivals {
    /// Create a Poisson arrival pattern averaging one arrival per `mean_interval`.
    pub fn new(mean_interval: f64, rng: SharedRng) -> Result<Self, SimError> {
        if !mean_interval.is_finite() || mean_interval <= 0.0 {
            return Err(SimError::Configuration(format!(
                "mean inter-arrival time must be positive, got {mean_interval}"
            )));
        }
        let exp_dist = Exp::new(1.0 / mean_interval).map_err(|e| {
            SimError::Configuration(format!("invalid arrival rate for mean {mean_interval}: {e}"))
        })?;
        Ok(Self {
            mean_interval,
            rng,
            exp_dist,
        })
    }

    /// Average arrivals per time unit.
    pub fn rate(&self) -> f64 {
        1.0 / self.mean_interval
    }
}

impl ArrivalPattern for PoissonArrivals {
    fn next_arrival_time(&mut self) -> f64 {
        self.rng.sample(self.exp_dist)
    }
}

/// Constant service time
#[derive(Debug, Clone)]
pub struct ConstantServiceTime {
    service_time: f64,
}

impl ConstantServiceTime {
    pub fn new(service_time: f64) -> Result<Self, SimError> {
        if !service_time.is_finite() || service_time < 0.0 {
            return Err(SimError::InvalidDuration {
                duration: service_time,
            });
        }
        Ok(Self { service_time })
    }
}

impl ServiceTimeDistribution for ConstantServiceTime {
    fn sample(&mut self) -> f64 {
        self.service_time
    }

    fn mean_service_time(&self) -> f64 {
        self.service_time
    }
}

/// Normally distributed service time, truncated at zero.
#[derive(Debug, Clone)]
pub struct NormalServiceTime {
    rng: SharedRng,
    normal: Normal<f64>,
}

impl NormalServiceTime {
    pub fn new(mean: f64, std_dev: f64, rng: SharedRng) -> Result<Self, SimError> {
        let normal = Normal::new(mean, std_dev).map_err(|e| {
            SimError::Configuration(format!(
                "invalid normal distribution (mean {mean}, std_dev {std_dev}): {e}"
            ))
        })?;
        Ok(Self { rng, normal })
    }
}

impl ServiceTimeDistribution for NormalServiceTime {
    fn sample(&mut self) -> f64 {
        let value: f64 = self.rng.sample(self.normal);
        value.max(0.0)
    }

    fn mean_service_time(&self) -> f64 {
        self.normal.mean()
    }
}
