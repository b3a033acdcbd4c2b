//! Demand estimator
//!
//! Exponential smoothing over an input stream of (timestamp, request_count)
//! samples, producing `demand_now` (the EMA) and `demand_next` (a short-horizon
//! projection). When no sample has arrived within `window_seconds`, both
//! collapse to zero rather than reporting stale demand.

use chrono::{DateTime, Utc};

const MAX_SLOPE: f64 = 0.5;

#[derive(Clone, Debug)]
pub struct DemandEstimator {
    window_seconds: u64,
    ema: f64,
    previous_ema: Option<f64>,
    last_sample_at: Option<DateTime<Utc>>,
}

impl DemandEstimator {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window_seconds,
            ema: 0.0,
            previous_ema: None,
            last_sample_at: None,
        }
    }

    fn alpha(&self) -> f64 {
        2.0 / (self.window_seconds as f64 + 1.0)
    }

    /// Folds a new (timestamp, request_count) sample into the EMA.
    pub fn observe(&mut self, at: DateTime<Utc>, request_count: f64) {
        let request_count = request_count.max(0.0);
        let alpha = self.alpha();
        self.previous_ema = Some(self.ema);
        self.ema = match self.last_sample_at {
            Some(_) => alpha * request_count + (1.0 - alpha) * self.ema,
            None => request_count,
        };
        self.last_sample_at = Some(at);
    }

    /// `(demand_now, demand_next)` as of `now`. Both collapse to zero once the
    /// last sample is older than `window_seconds`.
    pub fn estimate(&self, now: DateTime<Utc>) -> (f64, f64) {
        let stale = match self.last_sample_at {
            None => true,
            Some(t) => (now - t).num_seconds() > self.window_seconds as i64,
        };
        if stale {
            return (0.0, 0.0);
        }

        let demand_now = self.ema;
        let slope = match self.previous_ema {
            Some(prev) if prev.abs() > f64::EPSILON => {
                ((demand_now - prev) / prev).clamp(-MAX_SLOPE, MAX_SLOPE)
            }
            _ => 0.0,
        };
        let demand_next = demand_now * (1.0 + slope);
        (demand_now, demand_next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn no_samples_reports_zero() {
        let estimator = DemandEstimator::new(60);
        let (now, next) = estimator.estimate(Utc::now());
        assert_eq!(now, 0.0);
        assert_eq!(next, 0.0);
    }

    #[test]
    fn stale_samples_decay_to_zero() {
        let mut estimator = DemandEstimator::new(60);
        let t0 = Utc::now();
        estimator.observe(t0, 100.0);
        let (now, _) = estimator.estimate(t0 + Duration::seconds(61));
        assert_eq!(now, 0.0);
    }

    #[test]
    fn rising_demand_projects_positive_slope() {
        let mut estimator = DemandEstimator::new(60);
        let t0 = Utc::now();
        estimator.observe(t0, 10.0);
        estimator.observe(t0 + Duration::seconds(1), 50.0);
        let (now, next) = estimator.estimate(t0 + Duration::seconds(1));
        assert!(next >= now);
    }

    #[test]
    fn slope_is_clamped() {
        let mut estimator = DemandEstimator::new(600);
        let t0 = Utc::now();
        estimator.observe(t0, 1.0);
        estimator.observe(t0 + Duration::seconds(1), 1_000_000.0);
        let (now, next) = estimator.estimate(t0 + Duration::seconds(1));
        assert!(next <= now * 1.5 + 1e-6);
    }
}
