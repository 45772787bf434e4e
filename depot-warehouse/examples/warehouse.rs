//! Warehouse order fulfilment run
//!
//! Usage: warehouse [CONFIG.json] [REPORT.json]
//!
//! Without a configuration file the defaults are used (3 sectors with one employee
//! each, 2 trucks, an order every 5 minutes on average, 30 minutes of simulated time).
//!
//! Run with: cargo run --package depot-warehouse --example warehouse

use depot_core::init_simulation_logging;
use depot_warehouse::{WarehouseConfig, WarehouseError, WarehouseSimulation};
use tracing::info;

fn main() -> Result<(), WarehouseError> {
    init_simulation_logging();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => WarehouseConfig::from_path(path)?,
        None => WarehouseConfig::default(),
    };
    let output = args.next();

    let simulation = WarehouseSimulation::new(config)?;
    let report = simulation.run()?;

    info!(
        final_time = %report.final_time,
        created = report.orders_created,
        delivered = report.orders_delivered,
        "Orders"
    );
    info!(stats = %report.total_time, "Order total time");
    info!(stats = %report.waiting_time, "Order waiting time");
    info!(stats = %report.processing_time, "Order processing time");
    for resource in &report.resources {
        info!(
            resource = %resource.name,
            capacity = resource.capacity,
            waiting = %resource.waiting_time,
            mean_queue = resource.queue_size.map(|q| q.time_weighted_mean),
            utilization = resource.utilization.map(|u| u.time_weighted_mean),
            "Resource"
        );
    }
    if !report.orders_not_delivered.is_empty() {
        info!(orders = ?report.orders_not_delivered, "Orders not delivered");
    }

    if let Some(path) = output {
        report.export_json(path, true)?;
    }
    Ok(())
}
