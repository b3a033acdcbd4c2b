//! Engine-level defaults and per-session configuration
//!
//! `EngineConfig` collects environment-variable defaults via `clap`'s `env`
//! feature. `SessionConfigUpdate` is the per-session JSON merge body;
//! validation reports a `Vec` of structured field errors (field, message,
//! how_to_fix) rather than one opaque string.

use crate::carbon_aware::CarbonProvider;
use crate::policy::PolicyKind;
use crate::throttle::{ComponentBounds, DEFAULT_INTENSITY_CEILING, DEFAULT_INTENSITY_FLOOR};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Process-wide defaults, overridable by environment variable.
#[derive(Parser, Clone, Debug)]
#[command(name = "carbonsched")]
pub struct EngineConfig {
    #[arg(long, env = "DEFAULT_SCHEDULE_NAMESPACE", default_value = "default")]
    pub default_namespace: String,

    #[arg(long, env = "DEFAULT_SCHEDULE_NAME", default_value = "default")]
    pub default_name: String,

    #[arg(long, env = "TARGET_ERROR", default_value_t = 0.05)]
    pub target_error: f64,

    #[arg(long, env = "CREDIT_MIN", default_value_t = -0.5)]
    pub credit_min: f64,

    #[arg(long, env = "CREDIT_MAX", default_value_t = 0.5)]
    pub credit_max: f64,

    #[arg(long, env = "CREDIT_WINDOW", default_value_t = 300)]
    pub credit_window: u64,

    #[arg(long, env = "SCHEDULER_POLICY", default_value = "credit-greedy")]
    pub policy: String,

    #[arg(long, env = "SCHEDULE_VALID_FOR", default_value_t = 60)]
    pub schedule_valid_for: u64,

    #[arg(long, env = "CARBON_API_URL", default_value = "")]
    pub carbon_api_url: String,

    #[arg(long, env = "CARBON_API_TARGET", default_value = "national")]
    pub carbon_api_target: String,

    #[arg(long, env = "CARBON_API_TIMEOUT", default_value_t = 2.0)]
    pub carbon_api_timeout: f64,

    #[arg(long, env = "CARBON_API_CACHE_TTL", default_value_t = 300)]
    pub carbon_api_cache_ttl: u64,

    #[arg(long, env = "METRICS_PORT", default_value_t = 8001)]
    pub metrics_port: u16,

    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    pub api_port: u16,

    #[arg(long, env = "LOGLEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Dampens `CreditLedger::allowance`; not part of the session config wire
    /// contract, treated as an engine-level default instead (see DESIGN.md).
    #[arg(long, env = "CREDIT_SENSITIVITY", default_value_t = 1.0)]
    pub credit_sensitivity: f64,

    #[arg(long, env = "INTENSITY_FLOOR", default_value_t = DEFAULT_INTENSITY_FLOOR)]
    pub intensity_floor: f64,

    #[arg(long, env = "INTENSITY_CEILING", default_value_t = DEFAULT_INTENSITY_CEILING)]
    pub intensity_ceiling: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::parse_from(std::iter::empty::<String>())
    }
}

/// Process-wide values a freshly created session is seeded with. Distinct
/// from `SessionConfigUpdate`: these have no wire representation (the session's
/// Config object does not list them) and are only ever set at process
/// startup from `EngineConfig`.
#[derive(Clone, Debug)]
pub struct EngineDefaults {
    pub credit_sensitivity: f64,
    pub intensity_floor: f64,
    pub intensity_ceiling: f64,
    pub carbon_provider: CarbonProvider,
}

impl From<&EngineConfig> for EngineDefaults {
    fn from(c: &EngineConfig) -> Self {
        let carbon_provider = if c.carbon_api_url.is_empty() {
            CarbonProvider::Mock
        } else {
            CarbonProvider::Remote {
                url: c.carbon_api_url.clone(),
                token: String::new(),
            }
        };
        Self {
            credit_sensitivity: c.credit_sensitivity,
            intensity_floor: c.intensity_floor,
            intensity_ceiling: c.intensity_ceiling,
            carbon_provider,
        }
    }
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// One flavour entry in a `SessionConfigUpdate`. `precision` values above 1
/// are percentages and are normalised by `SessionConfigUpdate::validate`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlavourConfig {
    pub name: String,
    pub precision: f64,
    pub carbon_intensity: Option<f64>,
    pub enabled: Option<bool>,
    pub annotations: Option<HashMap<String, String>>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    pub min_replicas: u32,
    pub max_replicas: u32,
}

impl From<ComponentConfig> for ComponentBounds {
    fn from(c: ComponentConfig) -> Self {
        ComponentBounds {
            min_replicas: c.min_replicas,
            max_replicas: c.max_replicas,
        }
    }
}

/// The wire `Config object`, merged idempotently onto session state.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigUpdate {
    pub target_error: Option<f64>,
    pub credit_min: Option<f64>,
    pub credit_max: Option<f64>,
    pub credit_window: Option<u64>,
    pub policy: Option<String>,
    pub valid_for: Option<u64>,
    pub discovery_interval: Option<u64>,
    pub carbon_target: Option<String>,
    pub carbon_timeout: Option<f64>,
    pub carbon_cache_ttl: Option<u64>,
    pub components: Option<HashMap<String, ComponentConfig>>,
    pub flavours: Option<Vec<FlavourConfig>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
    pub how_to_fix: String,
}

impl ConfigValidationError {
    fn new(field: &str, message: impl Into<String>, how_to_fix: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            how_to_fix: how_to_fix.into(),
        }
    }
}

impl SessionConfigUpdate {
    /// Structural validation. Flavour `precision` values above 1 are
    /// normalised into `(0, 1]` in place as a side effect of a clean pass.
    pub fn validate(&mut self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if let Some(target_error) = self.target_error {
            if !(0.0..1.0).contains(&target_error) {
                errors.push(ConfigValidationError::new(
                    "targetError",
                    format!("targetError must be in [0, 1), got {target_error}"),
                    "set targetError to a value between 0.0 (inclusive) and 1.0 (exclusive)",
                ));
            }
        }

        if let (Some(min), Some(max)) = (self.credit_min, self.credit_max) {
            if !(min <= 0.0 && 0.0 <= max) {
                errors.push(ConfigValidationError::new(
                    "creditMin/creditMax",
                    format!("creditMin ({min}) and creditMax ({max}) must straddle 0"),
                    "set creditMin <= 0 and creditMax >= 0",
                ));
            }
        }

        if let Some(window) = self.credit_window {
            if window < 1 {
                errors.push(ConfigValidationError::new(
                    "creditWindow",
                    "creditWindow must be >= 1 second",
                    "set creditWindow to 1 or greater",
                ));
            }
        }

        if let Some(policy) = &self.policy {
            if PolicyKind::parse(policy).is_none() {
                errors.push(ConfigValidationError::new(
                    "policy",
                    format!("unknown policy '{policy}'"),
                    "use one of precision-tier, credit-greedy, forecast-aware, forecast-aware-global",
                ));
            }
        }

        if let Some(valid_for) = self.valid_for {
            if valid_for < 1 {
                errors.push(ConfigValidationError::new(
                    "validFor",
                    "validFor must be >= 1 second",
                    "set validFor to 1 or greater",
                ));
            }
        }

        if let Some(flavours) = &mut self.flavours {
            for flavour in flavours.iter_mut() {
                if flavour.precision > 1.0 {
                    flavour.precision /= 100.0;
                }
                if !(0.0..=1.0).contains(&flavour.precision) || flavour.precision <= 0.0 {
                    errors.push(ConfigValidationError::new(
                        "flavours[].precision",
                        format!(
                            "flavour '{}' precision must be in (0, 1] (or a percentage > 1), got {}",
                            flavour.name, flavour.precision
                        ),
                        "set precision to a value between 0 (exclusive) and 1, or 0-100 as a percentage",
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_target_error_out_of_range() {
        let mut update = SessionConfigUpdate {
            target_error: Some(1.5),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "targetError");
    }

    #[test]
    fn rejects_unknown_policy() {
        let mut update = SessionConfigUpdate {
            policy: Some("made-up".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn normalises_percentage_precision_in_place() {
        let mut update = SessionConfigUpdate {
            flavours: Some(vec![FlavourConfig {
                name: "a".to_string(),
                precision: 70.0,
                carbon_intensity: None,
                enabled: None,
                annotations: None,
            }]),
            ..Default::default()
        };
        update.validate().unwrap();
        assert!((update.flavours.unwrap()[0].precision - 0.7).abs() < 1e-9);
    }

    #[test]
    fn clean_update_passes() {
        let mut update = SessionConfigUpdate {
            target_error: Some(0.1),
            credit_min: Some(-0.5),
            credit_max: Some(0.5),
            credit_window: Some(300),
            policy: Some("credit-greedy".to_string()),
            valid_for: Some(60),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }
}
