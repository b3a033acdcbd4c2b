//! Types for the forecast provider adapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One slot of a provider's carbon-intensity schedule, roughly 30 minutes wide.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ForecastSlot {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub forecast: f64,
    pub index: Option<String>,
}

/// One point of the extended (up to 48h) horizon forecast.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ExtendedPoint {
    pub horizon_hours: f64,
    pub intensity: f64,
}

/// Observation produced by the forecast provider per evaluation cycle.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ForecastSnapshot {
    pub intensity_now: f64,
    pub intensity_next: f64,
    /// Ordered, covers at least the next half-hour; may be empty.
    pub schedule: Vec<ForecastSlot>,
    /// Ordered, up to 48h ahead.
    pub extended: Vec<ExtendedPoint>,
    pub demand_now: Option<f64>,
    pub demand_next: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Set when only `intensity_now` was observed and `intensity_next` was
    /// copied from it rather than sampled.
    pub forecast_degraded: bool,
}

/// Where the forecast provider adapter fetches its data from, selected by
/// configuration (`carbon_target`/`CARBON_API_URL`).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum CarbonProvider {
    /// A WattTime/ElectricityMaps-style forecast API.
    Remote {
        /// API base URL.
        url: String,
        /// API token.
        token: String,
    },
    /// A bespoke internal forecast service with a simpler JSON shape.
    Custom {
        /// API URL.
        url: String,
        /// Authentication header.
        auth_header: Option<String>,
    },
    /// Deterministic synthetic data for tests and local development.
    Mock,
}

impl Default for CarbonProvider {
    fn default() -> Self {
        Self::Mock
    }
}

/// Tunables accepted by `ForecastProvider::configure`.
#[derive(Clone, Debug)]
pub struct CarbonAwareConfig {
    pub provider: CarbonProvider,
    /// Zone/balancing-authority target passed to the provider, e.g. "national".
    pub carbon_target: String,
    /// Seconds before a fetch gives up and the sample is treated as `Unavailable`.
    pub carbon_timeout: f64,
    /// Seconds a cached sample remains valid before a refetch is attempted.
    pub carbon_cache_ttl: u64,
}

impl Default for CarbonAwareConfig {
    fn default() -> Self {
        Self {
            provider: CarbonProvider::default(),
            carbon_target: "national".to_string(),
            carbon_timeout: 2.0,
            carbon_cache_ttl: 300,
        }
    }
}
