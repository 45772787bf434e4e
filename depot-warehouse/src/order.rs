//! Orders and their journey through the warehouse.

use std::cell::RefCell;
use std::rc::Rc;

use depot_core::{Environment, SimError, SimTime};
use serde::Serialize;
use tracing::info;

use crate::delivery::{DeliveryArea, DeliveryRecord};
use crate::sector::SectorVisit;
use crate::warehouse::Warehouse;

/// Everything known about one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub id: usize,
    pub name: String,
    /// Sectors the order needs products from.
    pub sectors: Vec<usize>,
    pub arrived_at: SimTime,
    /// All sectors finished.
    pub prepared_at: Option<SimTime>,
    pub delivered_at: Option<SimTime>,
    pub visits: Vec<SectorVisit>,
    pub delivery: Option<DeliveryRecord>,
}

impl OrderRecord {
    pub fn new(id: usize, name: impl Into<String>, sectors: Vec<usize>, arrived_at: SimTime) -> Self {
        Self {
            id,
            name: name.into(),
            sectors,
            arrived_at,
            prepared_at: None,
            delivered_at: None,
            visits: Vec::new(),
            delivery: None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }

    /// Arrival to delivery, once delivered.
    pub fn total_time(&self) -> Option<f64> {
        self.delivered_at.map(|done| done - self.arrived_at)
    }

    /// Time spent queueing for employees and for a truck, once delivered.
    pub fn waiting_time(&self) -> Option<f64> {
        let delivery = self.delivery.as_ref()?;
        let in_sectors: f64 = self.visits.iter().map(SectorVisit::waiting_time).sum();
        Some(in_sectors + delivery.waiting_time())
    }

    /// Time spent being prepared and delivered, once delivered.
    pub fn processing_time(&self) -> Option<f64> {
        let delivery = self.delivery.as_ref()?;
        let in_sectors: f64 = self.visits.iter().map(SectorVisit::processing_time).sum();
        Some(in_sectors + delivery.delivery_time())
    }
}

/// Shared record of every order created during a run.
///
/// Orders are numbered from zero in arrival order, so an order's id is its position.
#[derive(Clone, Debug, Default)]
pub struct OrderLedger {
    orders: Rc<RefCell<Vec<OrderRecord>>>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_arrival(&self, record: OrderRecord) {
        let mut orders = self.orders.borrow_mut();
        debug_assert_eq!(record.id, orders.len(), "orders must arrive in id order");
        orders.push(record);
    }

    fn update(&self, id: usize, f: impl FnOnce(&mut OrderRecord)) {
        if let Some(record) = self.orders.borrow_mut().get_mut(id) {
            f(record);
        }
    }

    pub fn record_prepared(&self, id: usize, at: SimTime, visits: Vec<SectorVisit>) {
        self.update(id, |record| {
            record.prepared_at = Some(at);
            record.visits = visits;
        });
    }

    pub fn record_delivered(&self, id: usize, delivery: DeliveryRecord) {
        self.update(id, |record| {
            record.delivered_at = Some(delivery.delivered_at);
            record.delivery = Some(delivery);
        });
    }

    /// Snapshot of all orders, in arrival order.
    pub fn records(&self) -> Vec<OrderRecord> {
        self.orders.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.orders.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.borrow().is_empty()
    }
}

/// The life of one order: prepare it in every sector it needs, then, once all of them
/// are done, deliver it.
pub async fn order_journey(
    env: Environment,
    order: OrderRecord,
    warehouse: Warehouse,
    delivery_area: DeliveryArea,
    ledger: OrderLedger,
) -> Result<SimTime, SimError> {
    let OrderRecord { id, name, sectors, .. } = order;

    let visits = warehouse.handle_order(&name, &sectors).await?;
    let prepared_at = env.now();
    info!(order = %name, time = %prepared_at, "Order is processed and ready to be delivered");
    ledger.record_prepared(id, prepared_at, visits);

    let delivery = delivery_area.deliver(&env, &name).await?;
    let delivered_at = delivery.delivered_at;
    ledger.record_delivered(id, delivery);
    Ok(delivered_at)
}
