//! Warehouse sectors.

use std::cell::RefCell;
use std::fmt;

use depot_core::{Environment, Resource, SimError, SimTime};
use serde::Serialize;
use tracing::{debug, info};

use crate::dists::ServiceTimeDistribution;

/// One order's pass through one sector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorVisit {
    pub order: String,
    pub sector: usize,
    /// Joined the sector's queue.
    pub arrived_at: SimTime,
    /// An employee took the order.
    pub started_at: SimTime,
    pub finished_at: SimTime,
}

impl SectorVisit {
    pub fn waiting_time(&self) -> f64 {
        self.started_at - self.arrived_at
    }

    pub fn processing_time(&self) -> f64 {
        self.finished_at - self.started_at
    }

    pub fn total_time(&self) -> f64 {
        self.finished_at - self.arrived_at
    }
}

/// A sector has a limited number of employees working in parallel. An order's share
/// of work waits for a free employee, then takes a sampled preparation time.
pub struct Sector {
    id: usize,
    name: String,
    employees: Resource,
    preparation_time: RefCell<Box<dyn ServiceTimeDistribution>>,
}

impl Sector {
    pub fn new(
        env: &Environment,
        id: usize,
        num_employees: usize,
        preparation_time: Box<dyn ServiceTimeDistribution>,
    ) -> Result<Self, SimError> {
        let name = format!("Sector {id}");
        let employees = Resource::new(env, format!("{name} employees"), num_employees)?;
        Ok(Self {
            id,
            name,
            employees,
            preparation_time: RefCell::new(preparation_time),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn employees(&self) -> &Resource {
        &self.employees
    }

    /// Draw the preparation time of the next order handled here.
    pub fn sample_preparation_time(&self) -> f64 {
        self.preparation_time.borrow_mut().sample()
    }

    /// Wait for an employee, then prepare `order`'s products.
    pub async fn process_order(&self, env: &Environment, order: &str) -> Result<SectorVisit, SimError> {
        let arrived_at = env.now();
        info!(order, sector = self.id, time = %arrived_at, "Order arrives at the sector queue");

        let mut employee = self.employees.request();
        employee.granted().await;
        let started_at = env.now();
        info!(order, sector = self.id, time = %started_at, "Employee available");

        let preparation = self.sample_preparation_time();
        debug!(order, sector = self.id, preparation, "Preparation started");
        env.timeout(preparation)?.await;
        employee.release()?;

        let finished_at = env.now();
        info!(order, sector = self.id, time = %finished_at, "Order processed in sector");
        Ok(SectorVisit {
            order: order.to_string(),
            sector: self.id,
            arrived_at,
            started_at,
            finished_at,
        })
    }
}

impl fmt::Debug for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sector")
            .field("id", &self.id)
            .field("employees", &self.employees)
            .finish()
    }
}
