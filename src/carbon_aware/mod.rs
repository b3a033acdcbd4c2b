//! Forecast provider adapter
//!
//! Converts an external carbon-intensity endpoint into cached `ForecastSnapshot`s
//! with bounded latency and a typed `Unavailable` failure mode.

pub mod api;
pub mod provider;
pub mod types;

pub use api::ForecastClient;
pub use provider::ForecastProvider;
pub use types::{CarbonAwareConfig, CarbonProvider, ForecastSnapshot};
