//! Structured logging for simulation debugging
//!
//! The engine logs through [`tracing`]. Nothing is printed until a subscriber is
//! installed, which is what the functions below do.
//!
//! # Controlling the output
//!
//! ```rust
//! use depot_core::init_simulation_logging_with_level;
//! init_simulation_logging_with_level("debug");
//! ```
//!
//! `RUST_LOG` always wins over the level passed in:
//!
//! ```bash
//! RUST_LOG=debug cargo run --example warehouse
//! RUST_LOG=depot_core::resource=trace,depot_warehouse=debug cargo run --example warehouse
//! ```
//!
//! Level guidelines:
//! - **TRACE**: every resumption, request and release
//! - **DEBUG**: process lifecycle and queue grants
//! - **INFO**: run start and end, domain milestones
//! - **WARN**: failures nobody observed

use tracing::{info, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::types::ProcessId;

/// Initialize logging at `info`.
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info")
}

/// Initialize logging with a specific level
///
/// # Arguments
/// * `level` - Log level: "trace", "debug", "info", "warn", or "error"
///
/// Installing a subscriber twice is a no-op, so tests may call this freely.
pub fn init_simulation_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{level},depot_core::scheduler=info,depot_core::resource=info").into()
    });

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Simulation logging initialized at level: {}", level);
    }
}

/// Everything at `trace`, pretty-printed.
pub fn init_detailed_simulation_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trace,depot_core=trace,depot_warehouse=debug".into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Detailed simulation logging initialized");
    }
}

/// Span covering one [`Environment::execute`](crate::Environment::execute) call.
pub fn simulation_span(env_id: u64) -> Span {
    tracing::info_span!("simulation", env = env_id)
}

/// Span covering one resumption of a process.
pub fn process_span(name: &str, id: ProcessId) -> Span {
    tracing::debug_span!("process", name = name, id = %id)
}
