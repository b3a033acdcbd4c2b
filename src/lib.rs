//! carbonsched: carbon-aware request routing and replica-ceiling scheduler
//! for multi-flavour workloads.
//!
//! A `SchedulerSession` owns one workload's flavour mix, credit ledger, and
//! processing throttle; the `SchedulerRegistry` keeps one session per
//! `(namespace, name)` pair and is the shared entry point for the REST API.

pub mod carbon_aware;
pub mod config;
pub mod demand;
pub mod error;
pub mod flavour;
pub mod ledger;
pub mod policy;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod throttle;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
