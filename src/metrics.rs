//! Prometheus metrics: per-metric label structs, `Lazy<Family<Labels, _>>`
//! statics, and a single global `REGISTRY`.

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;
use std::sync::Mutex;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ScheduleLabels {
    pub namespace: String,
    pub schedule: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FlavourLabels {
    pub namespace: String,
    pub schedule: String,
    pub flavour: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PolicyLabels {
    pub namespace: String,
    pub schedule: String,
    pub policy: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ComponentLabels {
    pub namespace: String,
    pub schedule: String,
    pub component: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StrategyLabels {
    pub namespace: String,
    pub schedule: String,
    pub strategy: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HorizonLabels {
    pub namespace: String,
    pub schedule: String,
    pub horizon: String,
}

pub static SCHEDULE_FLAVOUR_WEIGHT: Lazy<Family<FlavourLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULE_VALID_UNTIL: Lazy<Family<ScheduleLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_CREDIT_BALANCE: Lazy<Family<PolicyLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_CREDIT_VELOCITY: Lazy<Family<PolicyLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_AVG_PRECISION: Lazy<Family<PolicyLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_PROCESSING_THROTTLE: Lazy<Family<PolicyLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_EFFECTIVE_REPLICA_CEILING: Lazy<Family<ComponentLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_POLICY_CHOICE_TOTAL: Lazy<Family<StrategyLabels, Counter<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_FORECAST_INTENSITY: Lazy<Family<HorizonLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Approximates a "gauge with explicit timestamp" series: `prometheus-client`
/// gauges carry no timestamp field of their own, so this is refreshed on the
/// same cadence as `SCHEDULER_FORECAST_INTENSITY` and scraped without one.
pub static SCHEDULER_FORECAST_INTENSITY_TIMESTAMPED: Lazy<Family<HorizonLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_EVALUATION_FAILED_TOTAL: Lazy<Family<ScheduleLabels, Counter<f64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SCHEDULER_EVALUATOR_UNHEALTHY: Lazy<Family<ScheduleLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| {
    let mut registry = Registry::default();
    registry.register(
        "schedule_flavour_weight",
        "Routing weight assigned to a flavour, 0-1",
        SCHEDULE_FLAVOUR_WEIGHT.clone(),
    );
    registry.register(
        "schedule_valid_until",
        "Unix timestamp the published schedule remains valid until",
        SCHEDULE_VALID_UNTIL.clone(),
    );
    registry.register(
        "scheduler_credit_balance",
        "Current credit ledger balance",
        SCHEDULER_CREDIT_BALANCE.clone(),
    );
    registry.register(
        "scheduler_credit_velocity",
        "EMA-smoothed first difference of the credit ledger balance",
        SCHEDULER_CREDIT_VELOCITY.clone(),
    );
    registry.register(
        "scheduler_avg_precision",
        "Expected precision of the current policy decision",
        SCHEDULER_AVG_PRECISION.clone(),
    );
    registry.register(
        "scheduler_processing_throttle",
        "Processing throttle in [throttle_min, 1]",
        SCHEDULER_PROCESSING_THROTTLE.clone(),
    );
    registry.register(
        "scheduler_effective_replica_ceiling",
        "Carbon-aware replica ceiling per component",
        SCHEDULER_EFFECTIVE_REPLICA_CEILING.clone(),
    );
    registry.register(
        "scheduler_policy_choice_total",
        "Cumulative weight routed to each flavour",
        SCHEDULER_POLICY_CHOICE_TOTAL.clone(),
    );
    registry.register(
        "scheduler_forecast_intensity",
        "Forecast carbon intensity by horizon",
        SCHEDULER_FORECAST_INTENSITY.clone(),
    );
    registry.register(
        "scheduler_forecast_intensity_timestamped",
        "Forecast carbon intensity by horizon, refreshed per sample",
        SCHEDULER_FORECAST_INTENSITY_TIMESTAMPED.clone(),
    );
    registry.register(
        "scheduler_evaluation_failed_total",
        "Transient evaluation failures absorbed by the session",
        SCHEDULER_EVALUATION_FAILED_TOTAL.clone(),
    );
    registry.register(
        "scheduler_evaluator_unhealthy",
        "1 when two consecutive evaluation failures have been absorbed",
        SCHEDULER_EVALUATOR_UNHEALTHY.clone(),
    );
    Mutex::new(registry)
});

/// Renders the registry in Prometheus text exposition format.
pub fn encode() -> String {
    let mut buffer = String::new();
    let registry = REGISTRY.lock().expect("metrics registry lock poisoned");
    prometheus_client::encoding::text::encode(&mut buffer, &registry)
        .expect("encoding the metrics registry cannot fail");
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metric_names() {
        SCHEDULER_CREDIT_BALANCE
            .get_or_create(&PolicyLabels {
                namespace: "default".to_string(),
                schedule: "default".to_string(),
                policy: "credit-greedy".to_string(),
            })
            .set(0.25);
        let text = encode();
        assert!(text.contains("scheduler_credit_balance"));
    }
}
