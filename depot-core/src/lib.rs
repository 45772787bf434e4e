//! Core discrete event simulation engine.
//!
//! This crate provides the building blocks for process-based discrete event
//! simulation: a clock and event queue, processes written as `async` blocks, counted
//! resources with FIFO queues, and fork/join over processes.
//!
//! # Architecture Overview
//!
//! - [`Environment`]: owns the [`Scheduler`] and the process table. Register processes
//!   with [`Environment::process`], then drive everything with [`Environment::run`].
//!
//! - Processes: any `Future<Output = Result<T, SimError>>`. A process suspends by
//!   awaiting a [`Timeout`], a [`Request::granted`] future, a [`ProcessHandle`] or an
//!   [`AllOf`] join, and the environment resumes it when the matching event fires.
//!
//! - [`Resource`]: a fixed number of slots and a FIFO wait queue.
//!
//! # Basic Usage
//!
//! ```rust
//! use depot_core::{Environment, Resource, SimTime};
//!
//! let env = Environment::new();
//! let trucks = Resource::new(&env, "trucks", 1).unwrap();
//!
//! let sim = env.clone();
//! let order = env.process("order", async move {
//!     let packers: Vec<_> = [5.0, 8.0, 3.0]
//!         .into_iter()
//!         .enumerate()
//!         .map(|(i, t)| {
//!             let sector = sim.clone();
//!             sim.process(format!("sector {i}"), async move {
//!                 sector.timeout(t)?.await;
//!                 Ok(())
//!             })
//!         })
//!         .collect();
//!     sim.all_of(packers).await?;
//!
//!     let mut truck = trucks.acquire().await;
//!     sim.timeout(20.0)?.await;
//!     truck.release()?;
//!     Ok(sim.now())
//! });
//!
//! env.run(None).unwrap();
//! assert_eq!(order.value().unwrap().unwrap(), SimTime::from(28.0));
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`], a non-negative number of abstract units. Events firing
//! at the same time are processed in the order they were scheduled, so a run is a
//! pure function of its inputs.

pub mod environment;
pub mod error;
pub mod execute;
pub mod logging;
pub mod process;
pub mod resource;
pub mod scheduler;
pub mod time;
pub mod types;
mod waker;

pub use environment::{Environment, Timeout, TraceRecord};
pub use error::SimError;
pub use execute::{Execute, Executor, ExecutorWithSideEffect};
pub use logging::{
    init_detailed_simulation_logging, init_simulation_logging,
    init_simulation_logging_with_level, process_span, simulation_span,
};
pub use process::{AllOf, ProcessHandle, ProcessState};
pub use resource::{Granted, Request, RequestStatus, Resource, ResourceSample};
pub use scheduler::{ClockRef, Continuation, EventEntry, EventHandle, EventKind, Scheduler};
pub use time::SimTime;
pub use types::{EventId, ProcessId, RequestId};
