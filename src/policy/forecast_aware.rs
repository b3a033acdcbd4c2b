//! 4.5.3 forecast-aware: credit-greedy plus a short-term trend adjustment.

use super::credit_greedy::{allocate, scaled_alpha};
use super::{expected_precision, PolicyResult, EPSILON};
use crate::carbon_aware::ForecastSnapshot;
use crate::flavour::FlavourProfile;
use crate::ledger::CreditLedger;
use std::collections::HashMap;

const CAP: f64 = 0.3;
const SCALE: f64 = 0.5;

pub(super) fn evaluate(
    flavours: &[FlavourProfile],
    forecast: &ForecastSnapshot,
    ledger: &CreditLedger,
    recent_intensities: &[f64],
) -> Option<PolicyResult> {
    let (alpha0, multiplier) =
        scaled_alpha(ledger, Some(forecast.intensity_now), recent_intensities);

    let trend = forecast.intensity_next - forecast.intensity_now;
    let adj = -(trend / forecast.intensity_now.max(EPSILON) * SCALE).clamp(-CAP, CAP);
    let alpha = (alpha0 + adj).clamp(0.0, 1.0);

    let (weights, baseline_name) = allocate(flavours, Some(forecast.intensity_now), alpha);

    let mut diagnostics = HashMap::new();
    diagnostics.insert("allowance".to_string(), ledger.allowance());
    diagnostics.insert("intensity_multiplier".to_string(), multiplier);
    diagnostics.insert("trend".to_string(), trend);
    diagnostics.insert("trend_adjustment".to_string(), adj);
    diagnostics.insert(
        "baseline_weight".to_string(),
        weights.get(&baseline_name).copied().unwrap_or(0.0),
    );

    Some(PolicyResult {
        expected_precision: expected_precision(flavours, &weights),
        weights,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn flavours() -> Vec<FlavourProfile> {
        vec![
            FlavourProfile::new("a", 1.0, 200.0),
            FlavourProfile::new("b", 0.7, 80.0),
        ]
    }

    fn forecast(intensity_now: f64, intensity_next: f64) -> ForecastSnapshot {
        ForecastSnapshot {
            intensity_now,
            intensity_next,
            schedule: Vec::new(),
            extended: Vec::new(),
            demand_now: None,
            demand_next: None,
            timestamp: Some(Utc::now()),
            forecast_degraded: false,
        }
    }

    #[test]
    fn dirtier_next_slot_increases_baseline_weight_relative_to_flat_trend() {
        let mut ledger = CreditLedger::new(0.1, -0.5, 0.5, 300);
        ledger.balance = 0.25;

        let flat = forecast(200.0, 200.0).clone();
        let dirtier = forecast(200.0, 260.0);

        let flat_result = evaluate(&flavours(), &flat, &ledger, &[]).unwrap();
        let dirtier_result = evaluate(&flavours(), &dirtier, &ledger, &[]).unwrap();

        assert!(dirtier_result.weights["a"] > flat_result.weights["a"]);
    }
}
