//! Scheduling policies
//!
//! A policy is a pure function of `(flavours, forecast, ledger) -> PolicyResult`.
//! Modelled as a tagged enum rather than a trait-object hierarchy: the fallback
//! chain (`forecast-aware-global -> forecast-aware -> credit-greedy -> precision-tier`)
//! is a single static function over the variant, not open inheritance.

mod credit_greedy;
mod forecast_aware;
mod forecast_aware_global;
mod precision_tier;

use crate::carbon_aware::ForecastSnapshot;
use crate::flavour::FlavourProfile;
use crate::ledger::CreditLedger;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub(crate) const EPSILON: f64 = 1e-9;

/// The four mandated policies, selected by name in the session's `Config` object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    PrecisionTier,
    CreditGreedy,
    ForecastAware,
    ForecastAwareGlobal,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrecisionTier => "precision-tier",
            Self::CreditGreedy => "credit-greedy",
            Self::ForecastAware => "forecast-aware",
            Self::ForecastAwareGlobal => "forecast-aware-global",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "precision-tier" => Some(Self::PrecisionTier),
            "credit-greedy" => Some(Self::CreditGreedy),
            "forecast-aware" => Some(Self::ForecastAware),
            "forecast-aware-global" => Some(Self::ForecastAwareGlobal),
            _ => None,
        }
    }

    /// The next policy down the fallback chain when this one's prerequisites
    /// are missing. `PrecisionTier` has none; it is the floor.
    fn fallback(self) -> Option<Self> {
        match self {
            Self::ForecastAwareGlobal => Some(Self::ForecastAware),
            Self::ForecastAware => Some(Self::CreditGreedy),
            Self::CreditGreedy => Some(Self::PrecisionTier),
            Self::PrecisionTier => None,
        }
    }
}

/// One evaluator's output: a distribution over enabled flavours plus its
/// accounting and explainability signals.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PolicyResult {
    pub weights: HashMap<String, f64>,
    pub expected_precision: f64,
    pub diagnostics: HashMap<String, f64>,
}

/// Extra state `forecast-aware-global` folds into its `emissions_adj` term.
/// Threaded in rather than owned by the policy module, since it belongs to
/// the session's running accounting.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmissionsState {
    pub cumulative_gco2: f64,
    pub request_count: u64,
}

/// Evaluates `kind`, falling back down the chain whenever a policy's required
/// input is absent, and stamping `diagnostics.policy_fallback = 1` whenever a
/// fallback occurred.
pub fn evaluate(
    kind: PolicyKind,
    flavours: &[FlavourProfile],
    forecast: Option<&ForecastSnapshot>,
    ledger: &CreditLedger,
    emissions: EmissionsState,
    recent_intensities: &[f64],
) -> PolicyResult {
    let mut current = kind;
    let mut fell_back = false;
    loop {
        let attempt = match current {
            PolicyKind::PrecisionTier => Some(precision_tier::evaluate(flavours)),
            PolicyKind::CreditGreedy => Some(credit_greedy::evaluate(
                flavours,
                forecast,
                ledger,
                recent_intensities,
            )),
            PolicyKind::ForecastAware => forecast
                .and_then(|f| forecast_aware::evaluate(flavours, f, ledger, recent_intensities)),
            PolicyKind::ForecastAwareGlobal => forecast.and_then(|f| {
                forecast_aware_global::evaluate(flavours, f, ledger, emissions, recent_intensities)
            }),
        };

        match attempt {
            Some(mut result) => {
                if fell_back {
                    result.diagnostics.insert("policy_fallback".to_string(), 1.0);
                }
                return result;
            }
            None => match current.fallback() {
                Some(next) => {
                    fell_back = true;
                    current = next;
                }
                None => {
                    // precision-tier always succeeds given at least one enabled flavour;
                    // an empty registry is handled by the session before evaluation runs.
                    let mut result = precision_tier::evaluate(flavours);
                    result.diagnostics.insert("policy_fallback".to_string(), 1.0);
                    return result;
                }
            },
        }
    }
}

/// Picks the highest-precision enabled flavour. Callers must ensure `flavours`
/// is non-empty.
pub(crate) fn baseline(flavours: &[FlavourProfile]) -> &FlavourProfile {
    flavours
        .iter()
        .max_by(|a, b| a.precision.partial_cmp(&b.precision).unwrap())
        .expect("baseline requires at least one flavour")
}

/// Normalises a weight map so it sums to 1 within `EPSILON`, leaving an
/// already-empty or all-zero map untouched.
pub(crate) fn normalize(weights: &mut HashMap<String, f64>) {
    let total: f64 = weights.values().sum();
    if total > EPSILON {
        for w in weights.values_mut() {
            *w /= total;
        }
    }
}

pub(crate) fn expected_precision(flavours: &[FlavourProfile], weights: &HashMap<String, f64>) -> f64 {
    flavours
        .iter()
        .map(|f| weights.get(&f.name).copied().unwrap_or(0.0) * f.precision)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CreditLedger;

    fn flavours() -> Vec<FlavourProfile> {
        vec![
            FlavourProfile::new("a", 1.0, 200.0),
            FlavourProfile::new("b", 0.7, 80.0),
        ]
    }

    #[test]
    fn forecast_aware_without_forecast_falls_back_to_credit_greedy_with_diagnostic() {
        let ledger = CreditLedger::new(0.05, -0.5, 0.5, 300);
        let result = evaluate(
            PolicyKind::ForecastAware,
            &flavours(),
            None,
            &ledger,
            EmissionsState::default(),
            &[],
        );
        assert_eq!(result.diagnostics.get("policy_fallback"), Some(&1.0));
    }

    #[test]
    fn precision_tier_never_falls_back() {
        let ledger = CreditLedger::new(0.05, -0.5, 0.5, 300);
        let result = evaluate(
            PolicyKind::PrecisionTier,
            &flavours(),
            None,
            &ledger,
            EmissionsState::default(),
            &[],
        );
        assert!(result.diagnostics.get("policy_fallback").is_none());
    }
}
