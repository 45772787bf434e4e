//! Order generation.

use depot_core::{Environment, ProcessHandle, SimError};
use tracing::info;

use crate::delivery::DeliveryArea;
use crate::dists::{ArrivalPattern, SharedRng};
use crate::order::{order_journey, OrderLedger, OrderRecord};
use crate::warehouse::Warehouse;

/// Creates orders at sampled intervals and starts a journey process for each.
pub struct OrderSource {
    env: Environment,
    warehouse: Warehouse,
    delivery_area: DeliveryArea,
    arrivals: Box<dyn ArrivalPattern>,
    rng: SharedRng,
    max_orders: Option<usize>,
    ledger: OrderLedger,
}

impl OrderSource {
    pub fn new(
        env: &Environment,
        warehouse: Warehouse,
        delivery_area: DeliveryArea,
        arrivals: Box<dyn ArrivalPattern>,
        rng: SharedRng,
        ledger: OrderLedger,
    ) -> Self {
        Self {
            env: env.clone(),
            warehouse,
            delivery_area,
            arrivals,
            rng,
            max_orders: None,
            ledger,
        }
    }

    /// Stop after `max_orders` orders.
    pub fn with_max_orders(mut self, max_orders: Option<usize>) -> Self {
        self.max_orders = max_orders;
        self
    }

    /// Register the source as a process. It resolves to the number of orders created
    /// once `max_orders` is reached; without a cap it runs until the horizon.
    pub fn start(self) -> ProcessHandle<usize> {
        let env = self.env.clone();
        env.process("Order source", self.generate())
    }

    async fn generate(mut self) -> Result<usize, SimError> {
        let mut created = 0;
        while self.max_orders.map_or(true, |max| created < max) {
            let interval = self.arrivals.next_arrival_time();
            self.env.timeout(interval)?.await;

            let name = format!("Order {created}");
            let sectors = self.rng.sample_subset(self.warehouse.sectors().len());
            let now = self.env.now();
            info!(order = %name, sectors = ?sectors, time = %now, "Order needs products from sectors");

            let record = OrderRecord::new(created, name.clone(), sectors, now);
            self.ledger.record_arrival(record.clone());
            self.env.process(
                name,
                order_journey(
                    self.env.clone(),
                    record,
                    self.warehouse.clone(),
                    self.delivery_area.clone(),
                    self.ledger.clone(),
                ),
            );
            created += 1;
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dists::{ConstantArrivalPattern, ConstantServiceTime, ServiceTimeDistribution};
    use depot_core::SimTime;

    #[test]
    fn test_source_stops_after_max_orders() {
        let env = Environment::new();
        let rng = SharedRng::seed_from_u64(1);
        let warehouse = Warehouse::new(&env, 2, 1, |_| {
            let preparation: Box<dyn ServiceTimeDistribution> =
                Box::new(ConstantServiceTime::new(1.0)?);
            Ok(preparation)
        })
        .unwrap();
        let area = DeliveryArea::new(&env, 1, Box::new(ConstantServiceTime::new(2.0).unwrap())).unwrap();
        let ledger = OrderLedger::new();

        let source = OrderSource::new(
            &env,
            warehouse,
            area,
            Box::new(ConstantArrivalPattern::new(5.0).unwrap()),
            rng,
            ledger.clone(),
        )
        .with_max_orders(Some(3))
        .start();
        env.run(None).unwrap();

        assert_eq!(source.value(), Some(Ok(3)));
        let records = ledger.records();
        let arrivals: Vec<SimTime> = records.iter().map(|r| r.arrived_at).collect();
        assert_eq!(
            arrivals,
            vec![SimTime::from(5.0), SimTime::from(10.0), SimTime::from(15.0)]
        );
        assert!(records.iter().all(OrderRecord::is_delivered));
        assert!(records.iter().all(|r| r.total_time() == Some(3.0)));
    }
}
