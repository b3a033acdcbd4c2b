//! REST API module
//!
//! Exposes config, schedule, health, and metrics endpoints over the
//! scheduler registry.

mod dto;
mod handlers;
mod server;

pub use server::{run_metrics_server, run_server, ApiState};
