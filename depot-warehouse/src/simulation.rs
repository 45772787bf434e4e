//! Assembly of a complete warehouse run from a [`WarehouseConfig`].

use depot_core::{Environment, ProcessHandle, SimTime};
use tracing::info;

use crate::config::WarehouseConfig;
use crate::delivery::DeliveryArea;
use crate::dists::{NormalServiceTime, PoissonArrivals, ServiceTimeDistribution, SharedRng};
use crate::error::WarehouseError;
use crate::order::OrderLedger;
use crate::report::{RunOutcome, WarehouseReport};
use crate::source::OrderSource;
use crate::warehouse::Warehouse;

/// Orders arrive to a warehouse with several sectors, each staffed by employees.
/// Every order needs products from a subset of the sectors; once all of them are
/// done the order moves to the delivery area, where it leaves on a free truck or
/// waits for one.
///
/// ```
/// use depot_warehouse::{WarehouseConfig, WarehouseSimulation};
///
/// let simulation = WarehouseSimulation::new(WarehouseConfig::default()).unwrap();
/// let report = simulation.run().unwrap();
/// assert_eq!(report.final_time.as_f64(), 30.0);
/// ```
pub struct WarehouseSimulation {
    config: WarehouseConfig,
    env: Environment,
    warehouse: Warehouse,
    delivery_area: DeliveryArea,
    ledger: OrderLedger,
    source: ProcessHandle<usize>,
}

impl WarehouseSimulation {
    /// Validate `config` and build the scenario. Nothing runs until [`run`](Self::run).
    pub fn new(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        config.validate()?;

        let env = Environment::new();
        let rng = SharedRng::seed_from_u64(config.random_seed);
        let processing = config.processing_time;
        let warehouse = Warehouse::new(&env, config.num_sectors, config.num_employees, |_| {
            let distribution: Box<dyn ServiceTimeDistribution> = Box::new(
                NormalServiceTime::new(processing.mean, processing.std_dev, rng.clone())?,
            );
            Ok(distribution)
        })?;
        let delivery_area = DeliveryArea::new(
            &env,
            config.num_trucks,
            Box::new(NormalServiceTime::new(
                config.delivery_time.mean,
                config.delivery_time.std_dev,
                rng.clone(),
            )?),
        )?;

        let ledger = OrderLedger::new();
        let source = OrderSource::new(
            &env,
            warehouse.clone(),
            delivery_area.clone(),
            Box::new(PoissonArrivals::new(config.order_interval, rng.clone())?),
            rng,
            ledger.clone(),
        )
        .with_max_orders(config.max_orders)
        .start();

        Ok(Self {
            config,
            env,
            warehouse,
            delivery_area,
            ledger,
            source,
        })
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// Run up to the configured horizon (or until every order is delivered when there
    /// is none) and build the report.
    pub fn run(&self) -> Result<WarehouseReport, WarehouseError> {
        let horizon = self.config.sim_time.map(SimTime::new).transpose()?;
        info!(
            seed = self.config.random_seed,
            horizon = ?horizon.map(|h| h.as_f64()),
            "Warehouse simulation started"
        );
        self.env.run(horizon)?;

        let report = self.report()?;
        info!(
            final_time = %report.final_time,
            orders_created = report.orders_created,
            orders_delivered = report.orders_delivered,
            source_finished = self.source.is_finished(),
            "Warehouse simulation finished"
        );
        Ok(report)
    }

    /// Statistics as of the current simulation time.
    pub fn report(&self) -> Result<WarehouseReport, WarehouseError> {
        let trucks = self.delivery_area.trucks();
        WarehouseReport::build(RunOutcome {
            config: &self.config,
            final_time: self.env.now(),
            orders: self.ledger.records(),
            sector_employees: self
                .warehouse
                .sectors()
                .iter()
                .map(|sector| sector.employees())
                .collect(),
            visits: self.warehouse.visits(),
            trucks,
            deliveries: self.delivery_area.deliveries(),
        })
    }
}

impl Drop for WarehouseSimulation {
    fn drop(&mut self) {
        // Processes hold clones of the environment.
        self.env.shutdown();
    }
}
