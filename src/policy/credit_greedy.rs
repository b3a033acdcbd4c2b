//! 4.5.2 credit-greedy: spends credit on greener flavours within the error budget.

use super::{baseline, expected_precision, normalize, PolicyResult, EPSILON};
use crate::carbon_aware::ForecastSnapshot;
use crate::flavour::FlavourProfile;
use crate::ledger::CreditLedger;
use std::collections::HashMap;

pub(super) fn evaluate(
    flavours: &[FlavourProfile],
    forecast: Option<&ForecastSnapshot>,
    ledger: &CreditLedger,
    recent_intensities: &[f64],
) -> PolicyResult {
    let intensity_now = forecast.map(|f| f.intensity_now);
    let (alpha, multiplier) = scaled_alpha(ledger, intensity_now, recent_intensities);
    let (weights, baseline_name) = allocate(flavours, intensity_now, alpha);

    let mut diagnostics = HashMap::new();
    diagnostics.insert("allowance".to_string(), ledger.allowance());
    diagnostics.insert("intensity_multiplier".to_string(), multiplier);
    diagnostics.insert(
        "baseline_weight".to_string(),
        weights.get(&baseline_name).copied().unwrap_or(0.0),
    );

    PolicyResult {
        expected_precision: expected_precision(flavours, &weights),
        weights,
        diagnostics,
    }
}

/// `allowance()` scaled by the intensity multiplier (clamped to [0.5, 2.0]
/// against a rolling median reference, bootstrapped to `intensity_now` when no
/// history is available), then clamped back into [0, 1].
pub(super) fn scaled_alpha(
    ledger: &CreditLedger,
    intensity_now: Option<f64>,
    recent_intensities: &[f64],
) -> (f64, f64) {
    let alpha0 = ledger.allowance();
    let multiplier = match intensity_now {
        Some(now) => {
            let reference = intensity_reference(recent_intensities, now);
            (now / reference.max(EPSILON)).clamp(0.5, 2.0)
        }
        None => 1.0,
    };
    ((alpha0 * multiplier).clamp(0.0, 1.0), multiplier)
}

fn intensity_reference(recent: &[f64], intensity_now: f64) -> f64 {
    if recent.is_empty() {
        return intensity_now;
    }
    let mut sorted: Vec<f64> = recent.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Distributes `alpha` of the mass over non-baseline flavours proportionally
/// to `max(score, 0)`, leaving `1 - alpha` on the baseline. All mass reverts to
/// the baseline when every non-baseline score is non-positive.
pub(super) fn allocate(
    flavours: &[FlavourProfile],
    intensity_now: Option<f64>,
    alpha: f64,
) -> (HashMap<String, f64>, String) {
    let base = baseline(flavours);
    let baseline_name = base.name.clone();

    let known_baseline_intensity = flavours
        .iter()
        .map(|f| f.carbon_intensity)
        .fold(0.0_f64, f64::max);
    let baseline_intensity = if known_baseline_intensity > 0.0 {
        known_baseline_intensity
    } else {
        intensity_now.unwrap_or(0.0)
    };

    let scores: HashMap<String, f64> = flavours
        .iter()
        .filter(|f| f.name != baseline_name)
        .map(|f| {
            let expected_error = (1.0 - f.precision).max(EPSILON);
            let score = (baseline_intensity - f.carbon_intensity) / expected_error;
            (f.name.clone(), score.max(0.0))
        })
        .collect();

    let score_total: f64 = scores.values().sum();

    let mut weights = HashMap::with_capacity(flavours.len());
    if score_total <= EPSILON {
        for f in flavours {
            weights.insert(f.name.clone(), 0.0);
        }
        weights.insert(baseline_name.clone(), 1.0);
    } else {
        weights.insert(baseline_name.clone(), 1.0 - alpha);
        for f in flavours {
            if f.name == baseline_name {
                continue;
            }
            let share = scores.get(&f.name).copied().unwrap_or(0.0) / score_total;
            weights.insert(f.name.clone(), alpha * share);
        }
    }

    normalize(&mut weights);
    (weights, baseline_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flavours() -> Vec<FlavourProfile> {
        vec![
            FlavourProfile::new("a", 1.0, 200.0),
            FlavourProfile::new("b", 0.7, 80.0),
        ]
    }

    #[test]
    fn zero_allowance_routes_everything_to_baseline() {
        let ledger = CreditLedger::new(0.05, -0.5, 0.5, 300); // initial balance = min -> allowance 0
        let result = evaluate(&flavours(), None, &ledger, &[]);
        assert!((result.weights["a"] - 1.0).abs() < 1e-9);
        assert!(result.weights["b"].abs() < 1e-9);
    }

    #[test]
    fn full_allowance_spends_on_greener_flavour() {
        let mut ledger = CreditLedger::new(0.05, -0.5, 0.5, 300);
        for _ in 0..50 {
            ledger.record(1.0);
        }
        assert_eq!(ledger.balance, 0.5);
        let result = evaluate(&flavours(), None, &ledger, &[]);
        assert!(result.weights["b"] > 0.0);
        assert!(result.weights["a"] < 1.0);
    }

    #[test]
    fn weights_sum_to_one() {
        let mut ledger = CreditLedger::new(0.05, -0.5, 0.5, 300);
        ledger.record(1.0);
        let result = evaluate(&flavours(), None, &ledger, &[]);
        let total: f64 = result.weights.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bootstrap_reference_yields_unit_multiplier() {
        let ledger = CreditLedger::new(0.05, -0.5, 0.5, 300);
        let (_, multiplier) = scaled_alpha(&ledger, Some(100.0), &[]);
        assert!((multiplier - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clean_grid_relative_to_history_lowers_multiplier_below_one() {
        let ledger = CreditLedger::new(0.05, -0.5, 0.5, 300);
        let (_, multiplier) = scaled_alpha(&ledger, Some(100.0), &[200.0, 210.0, 190.0]);
        assert!(multiplier < 1.0);
    }
}
