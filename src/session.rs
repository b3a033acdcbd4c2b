//! Scheduler session: the per-(namespace, name) owner of all stateful
//! components, running the periodic evaluation loop and publishing schedule
//! snapshots behind a single-writer/many-reader exchange primitive.
//!
//! The evaluation loop is a `tokio::spawn` task on a variable tick —
//! `min(valid_for - slack, eval_interval_cap)` rather than a fixed interval,
//! so sessions with a short `valid_for` still re-evaluate often enough to
//! keep their published snapshot from going stale.

use crate::carbon_aware::provider::ForecastProvider;
use crate::carbon_aware::types::{CarbonAwareConfig, CarbonProvider as ForecastSource};
use crate::carbon_aware::ForecastSnapshot;
use crate::config::{EngineDefaults, SessionConfigUpdate};
use crate::demand::DemandEstimator;
use crate::error::{Error, Result};
use crate::flavour::{FlavourProfile, FlavourRegistry};
use crate::ledger::CreditLedger;
use crate::policy::{self, EmissionsState, PolicyKind};
use crate::throttle::{ComponentBounds, ProcessingState, ThrottleConfig};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

const EVAL_INTERVAL_CAP_SECONDS: i64 = 15;
const SLACK_SECONDS: i64 = 2;
const INTENSITY_HISTORY_CAP: usize = 64;

#[derive(Clone, Debug, Serialize)]
pub struct FlavourWeight {
    pub name: String,
    pub precision: f64,
    pub weight: f64,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreditsView {
    pub balance: f64,
    pub velocity: f64,
    pub target: f64,
    pub min: f64,
    pub max: f64,
    pub allowance: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ProcessingView {
    pub throttle: f64,
    pub credits_ratio: f64,
    pub intensity_ratio: f64,
    pub ceilings: HashMap<String, u32>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ForecastView {
    pub intensity_now: f64,
    pub intensity_next: f64,
    pub schedule: Vec<crate::carbon_aware::types::ForecastSlot>,
}

/// The published contract. Weights are raw `[0, 1]`
/// reals; percent conversion for the wire is a DTO-layer concern.
#[derive(Clone, Debug, Serialize)]
pub struct ScheduleSnapshot {
    pub flavour_weights: HashMap<String, f64>,
    pub flavours: Vec<FlavourWeight>,
    pub policy: PolicyKind,
    pub credits: CreditsView,
    pub processing: ProcessingView,
    pub diagnostics: HashMap<String, f64>,
    pub forecast: ForecastView,
    pub valid_until: DateTime<Utc>,
    pub manual: bool,
}

enum PublishedState {
    Pending,
    Ready(ScheduleSnapshot),
}

struct RuntimeConfig {
    target_error: f64,
    credit_min: f64,
    credit_max: f64,
    credit_window: u64,
    policy: PolicyKind,
    valid_for: u64,
    carbon_target: String,
    carbon_timeout: f64,
    carbon_cache_ttl: u64,
    carbon_provider: ForecastSource,
    component_bounds: HashMap<String, ComponentBounds>,
    throttle: ThrottleConfig,
}

struct ManualOverride {
    snapshot: ScheduleSnapshot,
}

pub struct SchedulerSession {
    namespace: String,
    name: String,
    config: RwLock<RuntimeConfig>,
    flavours: FlavourRegistry,
    ledger: Mutex<CreditLedger>,
    demand: Mutex<DemandEstimator>,
    forecast: Arc<ForecastProvider>,
    processing: Mutex<ProcessingState>,
    recent_intensities: Mutex<VecDeque<f64>>,
    emissions: Mutex<EmissionsState>,
    published: RwLock<PublishedState>,
    manual_override: RwLock<Option<ManualOverride>>,
    consecutive_failures: AtomicU32,
    closed: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerSession {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Arc<Self> {
        Self::with_defaults(namespace, name, EngineDefaults::default())
    }

    /// Like [`new`](Self::new), seeded from process-wide defaults (credit
    /// sensitivity, intensity floor/ceiling, carbon provider) that have no
    /// wire representation in `SessionConfigUpdate`.
    pub fn with_defaults(
        namespace: impl Into<String>,
        name: impl Into<String>,
        defaults: EngineDefaults,
    ) -> Arc<Self> {
        let namespace = namespace.into();
        let name = name.into();

        let config = RuntimeConfig {
            target_error: 0.05,
            credit_min: -0.5,
            credit_max: 0.5,
            credit_window: 300,
            policy: PolicyKind::CreditGreedy,
            valid_for: 60,
            carbon_target: "national".to_string(),
            carbon_timeout: 2.0,
            carbon_cache_ttl: 300,
            carbon_provider: defaults.carbon_provider.clone(),
            component_bounds: HashMap::new(),
            throttle: ThrottleConfig {
                intensity_floor: defaults.intensity_floor,
                intensity_ceiling: defaults.intensity_ceiling,
                ..ThrottleConfig::default()
            },
        };

        let mut ledger = CreditLedger::new(
            config.target_error,
            config.credit_min,
            config.credit_max,
            config.credit_window,
        );
        ledger.sensitivity = defaults.credit_sensitivity;

        let session = Arc::new(Self {
            namespace,
            name,
            ledger: Mutex::new(ledger),
            demand: Mutex::new(DemandEstimator::new(config.credit_window)),
            forecast: Arc::new(ForecastProvider::new(CarbonAwareConfig {
                provider: defaults.carbon_provider,
                carbon_target: config.carbon_target.clone(),
                carbon_timeout: config.carbon_timeout,
                carbon_cache_ttl: config.carbon_cache_ttl,
            })),
            flavours: FlavourRegistry::new(),
            processing: Mutex::new(ProcessingState::new(HashMap::new())),
            recent_intensities: Mutex::new(VecDeque::with_capacity(INTENSITY_HISTORY_CAP)),
            emissions: Mutex::new(EmissionsState::default()),
            published: RwLock::new(PublishedState::Pending),
            manual_override: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            handle: Mutex::new(None),
            config: RwLock::new(config),
        });

        let loop_handle = tokio::spawn(run_evaluation_loop(Arc::clone(&session)));
        let session_for_handle = Arc::clone(&session);
        tokio::spawn(async move {
            *session_for_handle.handle.lock().await = Some(loop_handle);
        });

        session
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Idempotent merge of configuration fields. Flavour replacement and
    /// structural validation are the caller's responsibility via
    /// `SessionConfigUpdate::validate`; this assumes a clean update.
    #[instrument(skip(self, update), fields(namespace = %self.namespace, name = %self.name))]
    pub async fn configure(&self, update: SessionConfigUpdate) -> Result<()> {
        {
            let mut cfg = self.config.write().await;
            if let Some(v) = update.target_error {
                cfg.target_error = v;
            }
            if let Some(v) = update.credit_min {
                cfg.credit_min = v;
            }
            if let Some(v) = update.credit_max {
                cfg.credit_max = v;
            }
            if let Some(v) = update.credit_window {
                cfg.credit_window = v;
            }
            if let Some(name) = &update.policy {
                match PolicyKind::parse(name) {
                    Some(kind) => cfg.policy = kind,
                    None => return Err(Error::Validation(format!("unknown policy '{name}'"))),
                }
            }
            if let Some(v) = update.valid_for {
                cfg.valid_for = v;
            }
            if let Some(v) = &update.carbon_target {
                cfg.carbon_target = v.clone();
            }
            if let Some(v) = update.carbon_timeout {
                cfg.carbon_timeout = v;
            }
            if let Some(v) = update.carbon_cache_ttl {
                cfg.carbon_cache_ttl = v;
            }
            if let Some(components) = &update.components {
                for (name, bounds) in components {
                    cfg.component_bounds
                        .insert(name.clone(), (*bounds).into());
                }
            }

            let mut ledger = self.ledger.lock().await;
            ledger.target_error = cfg.target_error;
            ledger.min = cfg.credit_min;
            ledger.max = cfg.credit_max;
            ledger.window_seconds = cfg.credit_window;
            ledger.balance = ledger.balance.clamp(cfg.credit_min, cfg.credit_max);

            self.forecast
                .configure(CarbonAwareConfig {
                    provider: cfg.carbon_provider.clone(),
                    carbon_target: cfg.carbon_target.clone(),
                    carbon_timeout: cfg.carbon_timeout,
                    carbon_cache_ttl: cfg.carbon_cache_ttl,
                })
                .await;
        }

        if let Some(flavours) = update.flavours {
            let profiles: Vec<FlavourProfile> = flavours
                .into_iter()
                .map(|f| FlavourProfile {
                    name: f.name,
                    precision: f.precision,
                    carbon_intensity: f.carbon_intensity.unwrap_or(0.0),
                    latency_weight: 1.0,
                    enabled: f.enabled.unwrap_or(true),
                })
                .collect();
            self.flavours
                .replace(profiles)
                .await
                .map_err(Error::Validation)?;
        }

        Ok(())
    }

    /// Returns the latest published snapshot (automatic or manual), or
    /// `Error::Pending` before the first successful evaluation.
    pub async fn latest(&self) -> Result<ScheduleSnapshot> {
        if let Some(ov) = self.manual_override.read().await.as_ref() {
            if ov.snapshot.valid_until > Utc::now() {
                return Ok(ov.snapshot.clone());
            }
        }
        match &*self.published.read().await {
            PublishedState::Ready(snapshot) => Ok(snapshot.clone()),
            PublishedState::Pending => Err(Error::Pending(self.namespace.clone(), self.name.clone())),
        }
    }

    /// Installs a manual override valid until `valid_until`, or `now + valid_for`
    /// if absent. Rejects instants already in the past, leaving the current
    /// snapshot untouched.
    pub async fn install_override(
        &self,
        flavour_weights: HashMap<String, f64>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now();
        let valid_for = self.config.read().await.valid_for;
        let valid_until = valid_until.unwrap_or_else(|| now + ChronoDuration::seconds(valid_for as i64));
        if valid_until <= now {
            return Err(Error::Validation(
                "manual override valid_until must be in the future".to_string(),
            ));
        }

        let total: f64 = flavour_weights.values().sum();
        if total <= f64::EPSILON {
            return Err(Error::Validation(
                "manual override flavour_weights must sum to a positive value".to_string(),
            ));
        }
        let normalised: HashMap<String, f64> = flavour_weights
            .iter()
            .map(|(k, v)| (k.clone(), v / total))
            .collect();

        let flavours = self.flavours.snapshot().await;
        let flavour_views: Vec<FlavourWeight> = flavours
            .iter()
            .map(|f| FlavourWeight {
                name: f.name.clone(),
                precision: f.precision,
                weight: normalised.get(&f.name).copied().unwrap_or(0.0),
                deadline: Some(valid_until),
            })
            .collect();
        let (previous_credits, previous_processing) = match &*self.published.read().await {
            PublishedState::Ready(s) => (s.credits.clone(), s.processing.clone()),
            PublishedState::Pending => (CreditsView::default(), ProcessingView::default()),
        };

        let snapshot = ScheduleSnapshot {
            flavour_weights: normalised,
            flavours: flavour_views,
            policy: self.config.read().await.policy,
            credits: previous_credits,
            processing: previous_processing,
            diagnostics: HashMap::new(),
            forecast: ForecastView::default(),
            valid_until,
            manual: true,
        };

        *self.manual_override.write().await = Some(ManualOverride { snapshot });
        Ok(())
    }

    /// Stops the background evaluation loop. Idempotent.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }

    async fn evaluate_once(&self) -> Result<()> {
        let cfg_snapshot = {
            let cfg = self.config.read().await;
            (
                cfg.policy,
                cfg.valid_for,
                cfg.credit_min,
                cfg.credit_max,
                cfg.component_bounds.clone(),
                cfg.throttle,
            )
        };
        let (policy_kind, valid_for, credit_min, credit_max, component_bounds, throttle_config) =
            cfg_snapshot;

        let forecast_result = self.forecast.sample().await;
        let forecast: Option<ForecastSnapshot> = match &forecast_result {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(e) => {
                warn!("forecast unavailable this cycle: {}", e);
                None
            }
        };

        let flavours = self.flavours.snapshot().await;
        if flavours.is_empty() {
            self.republish_previous_with_extension(valid_for, "no_flavours")
                .await;
            return Ok(());
        }

        if let Some(snapshot) = &forecast {
            let mut recent = self.recent_intensities.lock().await;
            recent.push_back(snapshot.intensity_now);
            while recent.len() > INTENSITY_HISTORY_CAP {
                recent.pop_front();
            }
        }
        let recent_intensities: Vec<f64> =
            self.recent_intensities.lock().await.iter().copied().collect();

        let emissions = *self.emissions.lock().await;
        let ledger_snapshot = self.ledger.lock().await.clone();
        let result = policy::evaluate(
            policy_kind,
            &flavours,
            forecast.as_ref(),
            &ledger_snapshot,
            emissions,
            &recent_intensities,
        );

        if let Some(intensity_now) = forecast.as_ref().map(|f| f.intensity_now) {
            let mut emissions_guard = self.emissions.lock().await;
            emissions_guard.cumulative_gco2 += intensity_now * result.expected_precision;
            emissions_guard.request_count += 1;
        }

        {
            let mut ledger = self.ledger.lock().await;
            ledger.update(result.expected_precision, 1.0);
        }
        let ledger_after = self.ledger.lock().await.clone();

        let throttle_diag = {
            let mut processing = self.processing.lock().await;
            processing.component_bounds = component_bounds;
            processing.update(
                ledger_after.balance,
                credit_min,
                credit_max,
                forecast.as_ref().map(|f| f.intensity_now),
                throttle_config,
            )
        };

        let now = Utc::now();
        let valid_until = now + ChronoDuration::seconds(valid_for as i64);

        let flavour_weights = result.weights.clone();
        let flavour_views: Vec<FlavourWeight> = flavours
            .iter()
            .map(|f| FlavourWeight {
                name: f.name.clone(),
                precision: f.precision,
                weight: flavour_weights.get(&f.name).copied().unwrap_or(0.0),
                deadline: None,
            })
            .collect();

        let processing_state = self.processing.lock().await;
        let snapshot = ScheduleSnapshot {
            flavour_weights,
            flavours: flavour_views,
            policy: policy_kind,
            credits: CreditsView {
                balance: ledger_after.balance,
                velocity: ledger_after.velocity,
                target: ledger_after.target_error,
                min: ledger_after.min,
                max: ledger_after.max,
                allowance: ledger_after.allowance(),
            },
            processing: ProcessingView {
                throttle: processing_state.throttle,
                credits_ratio: throttle_diag.credits_ratio,
                intensity_ratio: throttle_diag.intensity_ratio,
                ceilings: processing_state.effective_ceilings.clone(),
            },
            diagnostics: result.diagnostics,
            forecast: forecast
                .map(|f| ForecastView {
                    intensity_now: f.intensity_now,
                    intensity_next: f.intensity_next,
                    schedule: f.schedule,
                })
                .unwrap_or_default(),
            valid_until,
            manual: false,
        };
        drop(processing_state);

        *self.published.write().await = PublishedState::Ready(snapshot);
        self.consecutive_failures.store(0, Ordering::SeqCst);

        #[cfg(feature = "metrics")]
        self.record_metrics().await;

        Ok(())
    }

    async fn republish_previous_with_extension(&self, valid_for: u64, reason: &str) {
        let mut guard = self.published.write().await;
        if let PublishedState::Ready(snapshot) = &mut *guard {
            snapshot.valid_until = Utc::now() + ChronoDuration::seconds(valid_for as i64);
            snapshot
                .diagnostics
                .insert(reason.to_string(), 1.0);
        }
    }

    #[cfg(feature = "metrics")]
    async fn record_metrics(&self) {
        use crate::metrics::{
            ComponentLabels, FlavourLabels, HorizonLabels, PolicyLabels, ScheduleLabels,
            StrategyLabels, SCHEDULER_AVG_PRECISION, SCHEDULER_CREDIT_BALANCE,
            SCHEDULER_CREDIT_VELOCITY, SCHEDULER_EFFECTIVE_REPLICA_CEILING,
            SCHEDULER_FORECAST_INTENSITY, SCHEDULER_FORECAST_INTENSITY_TIMESTAMPED,
            SCHEDULER_POLICY_CHOICE_TOTAL, SCHEDULER_PROCESSING_THROTTLE, SCHEDULE_FLAVOUR_WEIGHT,
            SCHEDULE_VALID_UNTIL,
        };

        let snapshot = match &*self.published.read().await {
            PublishedState::Ready(s) => s.clone(),
            PublishedState::Pending => return,
        };
        let policy_name = snapshot.policy.as_str().to_string();

        for (flavour, weight) in &snapshot.flavour_weights {
            SCHEDULE_FLAVOUR_WEIGHT
                .get_or_create(&FlavourLabels {
                    namespace: self.namespace.clone(),
                    schedule: self.name.clone(),
                    flavour: flavour.clone(),
                })
                .set(*weight);
            SCHEDULER_POLICY_CHOICE_TOTAL
                .get_or_create(&StrategyLabels {
                    namespace: self.namespace.clone(),
                    schedule: self.name.clone(),
                    strategy: flavour.clone(),
                })
                .inc_by(*weight);
        }

        SCHEDULE_VALID_UNTIL
            .get_or_create(&ScheduleLabels {
                namespace: self.namespace.clone(),
                schedule: self.name.clone(),
            })
            .set(snapshot.valid_until.timestamp() as f64);

        let policy_labels = PolicyLabels {
            namespace: self.namespace.clone(),
            schedule: self.name.clone(),
            policy: policy_name,
        };
        SCHEDULER_CREDIT_BALANCE
            .get_or_create(&policy_labels)
            .set(snapshot.credits.balance);
        SCHEDULER_CREDIT_VELOCITY
            .get_or_create(&policy_labels)
            .set(snapshot.credits.velocity);
        SCHEDULER_AVG_PRECISION.get_or_create(&policy_labels).set(
            snapshot
                .flavours
                .iter()
                .map(|f| f.weight * f.precision)
                .sum(),
        );
        SCHEDULER_PROCESSING_THROTTLE
            .get_or_create(&policy_labels)
            .set(snapshot.processing.throttle);

        for (component, ceiling) in &snapshot.processing.ceilings {
            SCHEDULER_EFFECTIVE_REPLICA_CEILING
                .get_or_create(&ComponentLabels {
                    namespace: self.namespace.clone(),
                    schedule: self.name.clone(),
                    component: component.clone(),
                })
                .set(*ceiling as f64);
        }

        SCHEDULER_FORECAST_INTENSITY
            .get_or_create(&HorizonLabels {
                namespace: self.namespace.clone(),
                schedule: self.name.clone(),
                horizon: "now".to_string(),
            })
            .set(snapshot.forecast.intensity_now);
        SCHEDULER_FORECAST_INTENSITY
            .get_or_create(&HorizonLabels {
                namespace: self.namespace.clone(),
                schedule: self.name.clone(),
                horizon: "next".to_string(),
            })
            .set(snapshot.forecast.intensity_next);

        SCHEDULER_FORECAST_INTENSITY_TIMESTAMPED
            .get_or_create(&HorizonLabels {
                namespace: self.namespace.clone(),
                schedule: self.name.clone(),
                horizon: "now".to_string(),
            })
            .set(snapshot.forecast.intensity_now);
        SCHEDULER_FORECAST_INTENSITY_TIMESTAMPED
            .get_or_create(&HorizonLabels {
                namespace: self.namespace.clone(),
                schedule: self.name.clone(),
                horizon: "next".to_string(),
            })
            .set(snapshot.forecast.intensity_next);
    }

    async fn record_failure(&self) {
        #[cfg(feature = "metrics")]
        {
            use crate::metrics::{ScheduleLabels, SCHEDULER_EVALUATION_FAILED_TOTAL};
            SCHEDULER_EVALUATION_FAILED_TOTAL
                .get_or_create(&ScheduleLabels {
                    namespace: self.namespace.clone(),
                    schedule: self.name.clone(),
                })
                .inc();
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= 2 {
            let mut guard = self.published.write().await;
            if let PublishedState::Ready(snapshot) = &mut *guard {
                snapshot
                    .diagnostics
                    .insert("evaluator_unhealthy".to_string(), 1.0);
            }
            #[cfg(feature = "metrics")]
            {
                use crate::metrics::{ScheduleLabels, SCHEDULER_EVALUATOR_UNHEALTHY};
                SCHEDULER_EVALUATOR_UNHEALTHY
                    .get_or_create(&ScheduleLabels {
                        namespace: self.namespace.clone(),
                        schedule: self.name.clone(),
                    })
                    .set(1.0);
            }
        }
    }
}

async fn run_evaluation_loop(session: Arc<SchedulerSession>) {
    loop {
        if session.closed.load(Ordering::SeqCst) {
            break;
        }

        let override_active = {
            let guard = session.manual_override.read().await;
            guard
                .as_ref()
                .map(|ov| ov.snapshot.valid_until > Utc::now())
                .unwrap_or(false)
        };

        if !override_active {
            if let Err(e) = session.evaluate_once().await {
                warn!(
                    namespace = %session.namespace,
                    name = %session.name,
                    "transient evaluation failure: {}", e
                );
                session.record_failure().await;
            }
        }

        let valid_for = session.config.read().await.valid_for as i64;
        let interval = (valid_for - SLACK_SECONDS).clamp(1, EVAL_INTERVAL_CAP_SECONDS);
        tokio::time::sleep(std::time::Duration::from_secs(interval as u64)).await;
    }
    info!(namespace = %session.namespace, name = %session.name, "evaluation loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlavourConfig;

    async fn seeded_session() -> Arc<SchedulerSession> {
        let session = SchedulerSession::new("ns", "svc");
        session
            .configure(SessionConfigUpdate {
                flavours: Some(vec![
                    FlavourConfig {
                        name: "a".to_string(),
                        precision: 1.0,
                        carbon_intensity: Some(200.0),
                        enabled: Some(true),
                        annotations: None,
                    },
                    FlavourConfig {
                        name: "b".to_string(),
                        precision: 0.7,
                        carbon_intensity: Some(80.0),
                        enabled: Some(true),
                        annotations: None,
                    },
                ]),
                policy: Some("precision-tier".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn latest_is_pending_before_first_evaluation() {
        let session = SchedulerSession::new("ns", "unevaluated");
        let result = session.latest().await;
        assert!(matches!(result, Err(Error::Pending(_, _))));
        session.close().await;
    }

    #[tokio::test]
    async fn evaluate_once_publishes_a_complete_snapshot() {
        let session = seeded_session().await;
        session.evaluate_once().await.unwrap();
        let snapshot = session.latest().await.unwrap();
        let total: f64 = snapshot.flavour_weights.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
        session.close().await;
    }

    #[tokio::test]
    async fn manual_override_rejects_past_valid_until() {
        let session = seeded_session().await;
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        let result = session
            .install_override(weights, Some(Utc::now() - ChronoDuration::seconds(1)))
            .await;
        assert!(result.is_err());
        session.close().await;
    }

    #[tokio::test]
    async fn manual_override_takes_precedence_over_automatic_snapshot() {
        let session = seeded_session().await;
        session.evaluate_once().await.unwrap();

        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        session
            .install_override(weights, Some(Utc::now() + ChronoDuration::seconds(120)))
            .await
            .unwrap();

        let snapshot = session.latest().await.unwrap();
        assert!(snapshot.manual);
        session.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = seeded_session().await;
        session.close().await;
        session.close().await;
    }
}
