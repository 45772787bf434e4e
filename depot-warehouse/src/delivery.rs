//! The delivery area and its trucks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use depot_core::{Environment, Resource, SimError, SimTime};
use serde::Serialize;
use tracing::info;

use crate::dists::ServiceTimeDistribution;

/// One order's delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRecord {
    pub order: String,
    /// Reached the delivery area and asked for a truck.
    pub requested_at: SimTime,
    /// Left on a truck.
    pub dispatched_at: SimTime,
    pub delivered_at: SimTime,
}

impl DeliveryRecord {
    pub fn waiting_time(&self) -> f64 {
        self.dispatched_at - self.requested_at
    }

    pub fn delivery_time(&self) -> f64 {
        self.delivered_at - self.dispatched_at
    }

    pub fn total_time(&self) -> f64 {
        self.delivered_at - self.requested_at
    }
}

/// A delivery area has a limited number of trucks dispatching in parallel. A ready
/// order waits for a free truck, then takes a sampled delivery time.
///
/// Cloning gives another handle to the same delivery area.
#[derive(Clone)]
pub struct DeliveryArea {
    trucks: Resource,
    delivery_time: Rc<RefCell<Box<dyn ServiceTimeDistribution>>>,
    deliveries: Rc<RefCell<Vec<DeliveryRecord>>>,
}

impl DeliveryArea {
    pub fn new(
        env: &Environment,
        num_trucks: usize,
        delivery_time: Box<dyn ServiceTimeDistribution>,
    ) -> Result<Self, SimError> {
        Ok(Self {
            trucks: Resource::new(env, "Delivery trucks", num_trucks)?,
            delivery_time: Rc::new(RefCell::new(delivery_time)),
            deliveries: Rc::default(),
        })
    }

    pub fn trucks(&self) -> &Resource {
        &self.trucks
    }

    /// Every finished delivery, in completion order.
    pub fn deliveries(&self) -> Vec<DeliveryRecord> {
        self.deliveries.borrow().clone()
    }

    /// Wait for a truck, then deliver `order`.
    pub async fn deliver(&self, env: &Environment, order: &str) -> Result<DeliveryRecord, SimError> {
        let requested_at = env.now();
        let mut truck = self.trucks.request();
        truck.granted().await;

        let dispatched_at = env.now();
        info!(order, time = %dispatched_at, "Order starts to be delivered");
        let delivery_time = self.delivery_time.borrow_mut().sample();
        env.timeout(delivery_time)?.await;
        truck.release()?;

        let record = DeliveryRecord {
            order: order.to_string(),
            requested_at,
            dispatched_at,
            delivered_at: env.now(),
        };
        info!(order, time = %record.delivered_at, "Order delivered");
        self.deliveries.borrow_mut().push(record.clone());
        Ok(record)
    }
}

impl fmt::Debug for DeliveryArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryArea")
            .field("trucks", &self.trucks)
            .field("deliveries", &self.deliveries.borrow().len())
            .finish()
    }
}
