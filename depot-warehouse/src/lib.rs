//! Warehouse order fulfilment on the depot engine.
//!
//! Orders arrive at exponentially distributed intervals. Each one needs products from
//! a random subset of the warehouse's sectors; the sectors prepare their share in
//! parallel, each with a limited number of employees. Once every share is ready the
//! order waits for one of the delivery trucks.
//!
//! [`WarehouseSimulation`] wires a [`WarehouseConfig`] into a runnable scenario and
//! produces a [`WarehouseReport`]. The building blocks ([`Sector`], [`Warehouse`],
//! [`DeliveryArea`], [`OrderSource`]) can also be composed by hand on an
//! [`Environment`](depot_core::Environment).

pub mod config;
pub mod delivery;
pub mod dists;
pub mod error;
pub mod order;
pub mod report;
pub mod sector;
pub mod simulation;
pub mod source;
pub mod warehouse;

pub use config::{TimeDistribution, WarehouseConfig};
pub use delivery::{DeliveryArea, DeliveryRecord};
pub use dists::{
    ArrivalPattern, ConstantArrivalPattern, ConstantServiceTime, NormalServiceTime,
    PoissonArrivals, ServiceTimeDistribution, SharedRng,
};
pub use error::WarehouseError;
pub use order::{order_journey, OrderLedger, OrderRecord};
pub use report::{ResourceReport, RunOutcome, WarehouseReport};
pub use sector::{Sector, SectorVisit};
pub use simulation::WarehouseSimulation;
pub use source::OrderSource;
pub use warehouse::Warehouse;
