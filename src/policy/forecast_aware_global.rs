//! 4.5.4 forecast-aware-global: credit-greedy's base allocation fused with four
//! adjustments (short-term trend, demand, cumulative emissions, lookahead).

use super::credit_greedy::{allocate, scaled_alpha};
use super::{expected_precision, EmissionsState, PolicyResult, EPSILON};
use crate::carbon_aware::ForecastSnapshot;
use crate::flavour::FlavourProfile;
use crate::ledger::CreditLedger;
use std::collections::HashMap;

const LOOKAHEAD_POINTS: usize = 6;

pub(super) fn evaluate(
    flavours: &[FlavourProfile],
    forecast: &ForecastSnapshot,
    ledger: &CreditLedger,
    emissions: EmissionsState,
    recent_intensities: &[f64],
) -> Option<PolicyResult> {
    let (alpha0, _) = scaled_alpha(ledger, Some(forecast.intensity_now), recent_intensities);
    let (mut weights, baseline_name) = allocate(flavours, Some(forecast.intensity_now), alpha0);

    let carbon_adj = carbon_adjustment(forecast.intensity_now, forecast.intensity_next);
    let demand_adj = demand_adjustment(forecast.demand_now, forecast.demand_next);
    let emissions_adj = emissions_adjustment(emissions, forecast.intensity_now);
    let lookahead_adj = lookahead_adjustment(forecast);

    let total =
        (0.35 * carbon_adj + 0.25 * demand_adj + 0.25 * emissions_adj + 0.15 * lookahead_adj)
            .clamp(-0.5, 0.5);

    apply_shift(&mut weights, &baseline_name, total);
    super::normalize(&mut weights);

    let mut diagnostics = HashMap::new();
    diagnostics.insert("carbon_adj".to_string(), carbon_adj);
    diagnostics.insert("demand_adj".to_string(), demand_adj);
    diagnostics.insert("emissions_adj".to_string(), emissions_adj);
    diagnostics.insert("lookahead_adj".to_string(), lookahead_adj);
    diagnostics.insert("total_adjustment".to_string(), total);
    diagnostics.insert(
        "cumulative_gco2_per_request".to_string(),
        emissions.cumulative_gco2 / (emissions.request_count.max(1) as f64),
    );

    Some(PolicyResult {
        expected_precision: expected_precision(flavours, &weights),
        weights,
        diagnostics,
    })
}

fn carbon_adjustment(intensity_now: f64, intensity_next: f64) -> f64 {
    let rel_delta = (intensity_next - intensity_now) / intensity_now.max(EPSILON);
    if rel_delta > 0.05 {
        (-rel_delta).clamp(-0.8, 0.0)
    } else if rel_delta < -0.05 {
        (-rel_delta).clamp(0.0, 0.8)
    } else {
        0.0
    }
}

fn demand_adjustment(demand_now: Option<f64>, demand_next: Option<f64>) -> f64 {
    match (demand_now, demand_next) {
        (Some(now), Some(next)) if now > EPSILON => {
            if next >= 1.5 * now {
                -0.6
            } else if next <= 0.7 * now {
                0.4
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn emissions_adjustment(emissions: EmissionsState, intensity_now: f64) -> f64 {
    let avg = emissions.cumulative_gco2 / (emissions.request_count.max(1) as f64);
    if avg > 1.2 * intensity_now {
        0.5
    } else if avg < 0.8 * intensity_now {
        -0.5
    } else {
        0.0
    }
}

fn lookahead_adjustment(forecast: &ForecastSnapshot) -> f64 {
    let mut points: Vec<&crate::carbon_aware::types::ExtendedPoint> =
        forecast.extended.iter().collect();
    points.sort_by(|a, b| a.horizon_hours.partial_cmp(&b.horizon_hours).unwrap());
    let sample: Vec<f64> = points
        .into_iter()
        .take(LOOKAHEAD_POINTS)
        .map(|p| p.intensity)
        .collect();
    if sample.is_empty() {
        return 0.0;
    }
    let min_future = sample.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_future = sample.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min_future < 0.6 * forecast.intensity_now {
        0.5
    } else if max_future > 1.4 * forecast.intensity_now {
        -0.5
    } else {
        0.0
    }
}

/// Shifts mass between the baseline and its non-baseline complement by `total`:
/// a positive `total` moves `|total| * baseline_mass` from baseline to
/// non-baseline (split proportionally to existing non-baseline weights, or
/// equally if they are all zero); a negative `total` moves the symmetric
/// amount back.
fn apply_shift(weights: &mut HashMap<String, f64>, baseline_name: &str, total: f64) {
    if total.abs() < EPSILON {
        return;
    }
    let baseline_mass = weights.get(baseline_name).copied().unwrap_or(0.0);
    let non_baseline_mass = 1.0 - baseline_mass;
    let non_baseline: Vec<String> = weights
        .keys()
        .filter(|k| k.as_str() != baseline_name)
        .cloned()
        .collect();
    if non_baseline.is_empty() {
        return;
    }

    if total > 0.0 {
        let moved = total * baseline_mass;
        *weights.get_mut(baseline_name).unwrap() -= moved;
        if non_baseline_mass > EPSILON {
            for name in &non_baseline {
                let share = weights[name] / non_baseline_mass;
                *weights.get_mut(name).unwrap() += moved * share;
            }
        } else {
            let share = moved / non_baseline.len() as f64;
            for name in &non_baseline {
                *weights.get_mut(name).unwrap() += share;
            }
        }
    } else {
        let moved = total.abs() * non_baseline_mass;
        *weights.get_mut(baseline_name).unwrap() += moved;
        if non_baseline_mass > EPSILON {
            for name in &non_baseline {
                let share = weights[name] / non_baseline_mass;
                *weights.get_mut(name).unwrap() -= moved * share;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbon_aware::types::ExtendedPoint;
    use chrono::Utc;

    fn flavours() -> Vec<FlavourProfile> {
        vec![
            FlavourProfile::new("a", 1.0, 200.0),
            FlavourProfile::new("b", 0.5, 120.0),
            FlavourProfile::new("c", 0.3, 60.0),
        ]
    }

    #[test]
    fn s4_global_fusion_matches_scenario_signs() {
        let mut ledger = CreditLedger::new(0.1, -0.5, 0.5, 300);
        ledger.balance = 0.1;

        let intensity_now = 200.0;
        let forecast = ForecastSnapshot {
            intensity_now,
            intensity_next: 0.9 * intensity_now,
            schedule: Vec::new(),
            extended: vec![ExtendedPoint {
                horizon_hours: 1.0,
                intensity: intensity_now,
            }],
            demand_now: Some(100.0),
            demand_next: Some(160.0),
            timestamp: Some(Utc::now()),
            forecast_degraded: false,
        };
        let emissions = EmissionsState {
            cumulative_gco2: 1.3 * intensity_now,
            request_count: 1,
        };

        let result = evaluate(&flavours(), &forecast, &ledger, emissions, &[]).unwrap();
        assert!(result.diagnostics["carbon_adj"] > 0.0);
        assert_eq!(result.diagnostics["demand_adj"], -0.6);
        assert_eq!(result.diagnostics["emissions_adj"], 0.5);
        assert!(result.diagnostics["total_adjustment"] >= -0.5);
        assert!(result.diagnostics["total_adjustment"] <= 0.5);
    }

    #[test]
    fn weights_still_sum_to_one_after_shift() {
        let ledger = CreditLedger::new(0.1, -0.5, 0.5, 300);
        let forecast = ForecastSnapshot {
            intensity_now: 200.0,
            intensity_next: 260.0,
            schedule: Vec::new(),
            extended: Vec::new(),
            demand_now: None,
            demand_next: None,
            timestamp: Some(Utc::now()),
            forecast_degraded: false,
        };
        let result = evaluate(
            &flavours(),
            &forecast,
            &ledger,
            EmissionsState::default(),
            &[],
        )
        .unwrap();
        let total: f64 = result.weights.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }
}
