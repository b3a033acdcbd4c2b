//! Wire DTOs for the REST layer's JSON shapes.
//!
//! Internal types carry raw `[0, 1]` weights; the wire form wants integer
//! percent summing to 100, rounding residual on the highest-precision
//! enabled flavour (see DESIGN.md's open-question decision).

use crate::session::ScheduleSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlavourWireEntry {
    pub name: String,
    pub precision: f64,
    pub weight: i64,
    pub deadline: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PolicyWire {
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreditsWire {
    pub balance: f64,
    pub velocity: f64,
    pub target: f64,
    pub min: f64,
    pub max: f64,
    pub allowance: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProcessingWire {
    pub throttle: f64,
    #[serde(rename = "creditsRatio")]
    pub credits_ratio: f64,
    #[serde(rename = "intensityRatio")]
    pub intensity_ratio: f64,
    pub ceilings: HashMap<String, u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ForecastSlotWire {
    pub from: String,
    pub to: String,
    pub forecast: f64,
    pub index: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ForecastWire {
    pub intensity_now: f64,
    pub intensity_next: f64,
    pub schedule: Vec<ForecastSlotWire>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSnapshotWire {
    pub flavour_weights: HashMap<String, i64>,
    pub flavours: Vec<FlavourWireEntry>,
    pub policy: PolicyWire,
    pub credits: CreditsWire,
    pub processing: ProcessingWire,
    pub diagnostics: HashMap<String, f64>,
    pub forecast: ForecastWire,
    pub valid_until: String,
    pub manual: bool,
}

/// Rounds `[0, 1]` weights to an integer percent summing exactly to 100,
/// placing the rounding residual on the highest-precision enabled flavour.
fn weights_to_percent(
    weights: &HashMap<String, f64>,
    flavours: &[(String, f64, bool)],
) -> HashMap<String, i64> {
    let mut percents: HashMap<String, i64> = weights
        .iter()
        .map(|(name, w)| (name.clone(), (w * 100.0).round() as i64))
        .collect();

    let total: i64 = percents.values().sum();
    let residual = 100 - total;
    if residual != 0 {
        if let Some((anchor, _, _)) = flavours
            .iter()
            .filter(|(_, _, enabled)| *enabled)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            *percents.entry(anchor.clone()).or_insert(0) += residual;
        }
    }
    percents
}

impl From<ScheduleSnapshot> for ScheduleSnapshotWire {
    fn from(s: ScheduleSnapshot) -> Self {
        let flavour_facts: Vec<(String, f64, bool)> = s
            .flavours
            .iter()
            .map(|f| (f.name.clone(), f.precision, true))
            .collect();
        let flavour_weights = weights_to_percent(&s.flavour_weights, &flavour_facts);

        let flavours = s
            .flavours
            .iter()
            .map(|f| FlavourWireEntry {
                name: f.name.clone(),
                precision: (f.precision * 100.0).round(),
                weight: flavour_weights.get(&f.name).copied().unwrap_or(0),
                deadline: f.deadline.map(|d| d.to_rfc3339()),
            })
            .collect();

        ScheduleSnapshotWire {
            flavour_weights,
            flavours,
            policy: PolicyWire {
                name: s.policy.as_str().to_string(),
            },
            credits: CreditsWire {
                balance: s.credits.balance,
                velocity: s.credits.velocity,
                target: s.credits.target,
                min: s.credits.min,
                max: s.credits.max,
                allowance: s.credits.allowance,
            },
            processing: ProcessingWire {
                throttle: s.processing.throttle,
                credits_ratio: s.processing.credits_ratio,
                intensity_ratio: s.processing.intensity_ratio,
                ceilings: s.processing.ceilings,
            },
            diagnostics: s.diagnostics,
            forecast: ForecastWire {
                intensity_now: s.forecast.intensity_now,
                intensity_next: s.forecast.intensity_next,
                schedule: s
                    .forecast
                    .schedule
                    .into_iter()
                    .map(|slot| ForecastSlotWire {
                        from: slot.from.to_rfc3339(),
                        to: slot.to.to_rfc3339(),
                        forecast: slot.forecast,
                        index: slot.index,
                    })
                    .collect(),
            },
            valid_until: s.valid_until.to_rfc3339(),
            manual: s.manual,
        }
    }
}

/// Body of `POST /schedule/{ns}/{name}/manual` and `/setschedule`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualOverrideRequest {
    pub flavour_weights: HashMap<String, f64>,
    pub valid_until: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProblemDetail {
    pub status: String,
    pub errors: Vec<ConfigFieldError>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConfigFieldError {
    pub field: String,
    pub message: String,
    pub how_to_fix: String,
}

impl From<crate::config::ConfigValidationError> for ConfigFieldError {
    fn from(e: crate::config::ConfigValidationError) -> Self {
        Self {
            field: e.field,
            message: e.message,
            how_to_fix: e.how_to_fix,
        }
    }
}

impl ProblemDetail {
    pub fn from_validation_errors(errors: Vec<crate::config::ConfigValidationError>) -> Self {
        Self {
            status: "invalid".to_string(),
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Wraps a single freeform message, for failures that don't originate
    /// from `SessionConfigUpdate::validate` (e.g. an unknown policy rejected
    /// downstream in `SchedulerSession::configure`).
    pub fn from_message(field: &str, message: impl Into<String>) -> Self {
        Self {
            status: "invalid".to_string(),
            errors: vec![ConfigFieldError {
                field: field.to_string(),
                message: message.into(),
                how_to_fix: "check the field value against the documented constraints".to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_weights_sum_to_100_with_residual_on_highest_precision() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.333);
        weights.insert("b".to_string(), 0.333);
        weights.insert("c".to_string(), 0.334);
        let flavours = vec![
            ("a".to_string(), 1.0, true),
            ("b".to_string(), 0.5, true),
            ("c".to_string(), 0.2, true),
        ];
        let percents = weights_to_percent(&weights, &flavours);
        let total: i64 = percents.values().sum();
        assert_eq!(total, 100);
        assert_eq!(*percents.get("a").unwrap(), 34);
    }
}
