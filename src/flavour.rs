//! Flavour registry
//!
//! Holds the set of flavour profiles a workload currently exposes, behind a
//! read-write boundary that never blocks the evaluator for longer than a lock
//! acquisition: replacement is a single atomic swap of the whole list.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One variant of the target workload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlavourProfile {
    /// Stable identifier within the workload.
    pub name: String,
    /// Real in (0, 1], where 1 denotes the baseline/highest-quality flavour.
    pub precision: f64,
    /// Non-negative, per-request grams-CO2e estimate. 0 means "unknown".
    pub carbon_intensity: f64,
    /// Optional non-negative cost factor, default 1.
    pub latency_weight: f64,
    pub enabled: bool,
}

impl FlavourProfile {
    pub fn new(name: impl Into<String>, precision: f64, carbon_intensity: f64) -> Self {
        Self {
            name: name.into(),
            precision,
            carbon_intensity,
            latency_weight: 1.0,
            enabled: true,
        }
    }
}

/// Thread-safe set of enabled flavours with precision and carbon-intensity estimates.
#[derive(Clone)]
pub struct FlavourRegistry {
    profiles: Arc<RwLock<Vec<FlavourProfile>>>,
}

impl FlavourRegistry {
    pub fn new() -> Self {
        Self {
            profiles: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Atomic swap of the whole flavour list. Rejects the update if every
    /// profile in `profiles` would be disabled, leaving the prior set intact.
    pub async fn replace(&self, profiles: Vec<FlavourProfile>) -> Result<(), String> {
        if !profiles.is_empty() && profiles.iter().all(|f| !f.enabled) {
            return Err("cannot replace flavours: all would be disabled".to_string());
        }
        let mut guard = self.profiles.write().await;
        *guard = profiles;
        Ok(())
    }

    /// Enabled flavours sorted by descending precision; the first entry is the baseline.
    pub async fn snapshot(&self) -> Vec<FlavourProfile> {
        let guard = self.profiles.read().await;
        let mut enabled: Vec<FlavourProfile> =
            guard.iter().filter(|f| f.enabled).cloned().collect();
        enabled.sort_by(|a, b| {
            b.precision
                .partial_cmp(&a.precision)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        enabled
    }

    /// True when the registry currently has no enabled flavours.
    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }
}

impl Default for FlavourRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_sorts_by_descending_precision() {
        let registry = FlavourRegistry::new();
        registry
            .replace(vec![
                FlavourProfile::new("low", 0.3, 80.0),
                FlavourProfile::new("high", 1.0, 200.0),
                FlavourProfile::new("mid", 0.7, 120.0),
            ])
            .await
            .unwrap();

        let snap = registry.snapshot().await;
        let names: Vec<&str> = snap.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn snapshot_excludes_disabled_flavours() {
        let registry = FlavourRegistry::new();
        let mut disabled = FlavourProfile::new("off", 0.5, 50.0);
        disabled.enabled = false;
        registry
            .replace(vec![FlavourProfile::new("on", 1.0, 100.0), disabled])
            .await
            .unwrap();

        let snap = registry.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].name, "on");
    }

    #[tokio::test]
    async fn replace_rejects_all_disabled() {
        let registry = FlavourRegistry::new();
        registry
            .replace(vec![FlavourProfile::new("seed", 1.0, 100.0)])
            .await
            .unwrap();

        let mut off = FlavourProfile::new("off", 1.0, 100.0);
        off.enabled = false;
        let result = registry.replace(vec![off]).await;
        assert!(result.is_err());

        // prior set remains intact
        let snap = registry.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].name, "seed");
    }
}
