//! Processing-throttle computation
//!
//! Derives a scalar `throttle` from the credit ledger's balance and the
//! current grid intensity, then maps it onto per-component replica ceilings.
//! `router` components are excluded from throttling to preserve ingress
//! capacity; the throttle instead trades latency in the buffering layer for
//! scaled-down downstream workers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_THROTTLE_MIN: f64 = 0.2;
pub const DEFAULT_INTENSITY_FLOOR: f64 = 150.0;
pub const DEFAULT_INTENSITY_CEILING: f64 = 350.0;
const SMOOTHING_BETA: f64 = 0.5;
const ROUTER_COMPONENT: &str = "router";

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ComponentBounds {
    pub min_replicas: u32,
    pub max_replicas: u32,
}

/// Per-session throttle state, carried across evaluation cycles for the IIR
/// smoothing step.
#[derive(Clone, Debug, Default)]
pub struct ProcessingState {
    pub throttle: f64,
    pub effective_ceilings: HashMap<String, u32>,
    pub component_bounds: HashMap<String, ComponentBounds>,
}

/// Tunables an operator may override per deployment.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    pub throttle_min: f64,
    pub intensity_floor: f64,
    pub intensity_ceiling: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            throttle_min: DEFAULT_THROTTLE_MIN,
            intensity_floor: DEFAULT_INTENSITY_FLOOR,
            intensity_ceiling: DEFAULT_INTENSITY_CEILING,
        }
    }
}

/// The unsmoothed components, retained for diagnostics.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThrottleDiagnostics {
    pub credits_ratio: f64,
    pub intensity_ratio: f64,
    pub raw: f64,
}

impl ProcessingState {
    pub fn new(component_bounds: HashMap<String, ComponentBounds>) -> Self {
        Self {
            throttle: 1.0,
            effective_ceilings: HashMap::new(),
            component_bounds,
        }
    }

    /// Runs one evaluation step: computes the new smoothed `throttle`, updates
    /// `effective_ceilings`, and returns the unsmoothed diagnostics.
    pub fn update(
        &mut self,
        balance: f64,
        credit_min: f64,
        credit_max: f64,
        intensity_now: Option<f64>,
        config: ThrottleConfig,
    ) -> ThrottleDiagnostics {
        let credits_ratio = if credit_max - credit_min > f64::EPSILON {
            ((balance - credit_min) / (credit_max - credit_min)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let intensity_ratio = match intensity_now {
            Some(now) => {
                let span = config.intensity_ceiling - config.intensity_floor;
                if span > f64::EPSILON {
                    1.0 - ((now - config.intensity_floor) / span).clamp(0.0, 1.0)
                } else {
                    1.0
                }
            }
            None => 1.0,
        };

        let raw = credits_ratio.min(intensity_ratio);
        let unsmoothed = raw.max(config.throttle_min);

        self.throttle = (1.0 - SMOOTHING_BETA) * self.throttle + SMOOTHING_BETA * unsmoothed;

        self.effective_ceilings = self
            .component_bounds
            .iter()
            .map(|(name, bounds)| {
                let ceiling = if name == ROUTER_COMPONENT {
                    bounds.max_replicas
                } else {
                    bounds
                        .min_replicas
                        .max((bounds.max_replicas as f64 * self.throttle).floor() as u32)
                };
                (name.clone(), ceiling)
            })
            .collect();

        ThrottleDiagnostics {
            credits_ratio,
            intensity_ratio,
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min_r: u32, max_r: u32) -> ComponentBounds {
        ComponentBounds {
            min_replicas: min_r,
            max_replicas: max_r,
        }
    }

    #[test]
    fn s5_throttle_clamp_scenario() {
        let mut bounds_map = HashMap::new();
        bounds_map.insert("consumer".to_string(), bounds(1, 15));
        bounds_map.insert("router".to_string(), bounds(1, 15));
        let mut state = ProcessingState::new(bounds_map);

        // drive the IIR smoothing to its floor over a few cycles at credit_min
        for _ in 0..10 {
            state.update(-0.5, -0.5, 0.5, Some(400.0), ThrottleConfig::default());
        }

        assert!((state.throttle - 0.2).abs() < 1e-6);
        assert_eq!(state.effective_ceilings["consumer"], 3);
        assert_eq!(state.effective_ceilings["router"], 15);
    }

    #[test]
    fn absent_forecast_yields_unit_intensity_ratio() {
        let mut state = ProcessingState::new(HashMap::new());
        let diag = state.update(0.5, -0.5, 0.5, None, ThrottleConfig::default());
        assert_eq!(diag.intensity_ratio, 1.0);
    }

    #[test]
    fn ceiling_equals_max_when_throttle_is_one() {
        let mut bounds_map = HashMap::new();
        bounds_map.insert("worker".to_string(), bounds(2, 20));
        let mut state = ProcessingState::new(bounds_map);
        state.throttle = 1.0;
        for _ in 0..10 {
            state.update(0.5, -0.5, 0.5, Some(100.0), ThrottleConfig::default());
        }
        assert_eq!(state.effective_ceilings["worker"], 20);
    }
}
