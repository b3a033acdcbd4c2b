//! Scheduler registry: the set of sessions keyed by (namespace, name).
//!
//! One shared `Arc`-backed session owner per key, serialised per key and
//! concurrent across keys via one outer lock guarding the map and
//! per-session locks guarding each session's own state.

use crate::config::{EngineDefaults, SessionConfigUpdate};
use crate::error::{Error, Result};
use crate::session::{ScheduleSnapshot, SchedulerSession};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

type Key = (String, String);

#[derive(Clone)]
pub struct SchedulerRegistry {
    sessions: Arc<RwLock<HashMap<Key, Arc<SchedulerSession>>>>,
    defaults: EngineDefaults,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::with_defaults(EngineDefaults::default())
    }

    /// Like [`new`](Self::new), seeding every session created from here on
    /// with process-wide defaults that have no wire representation.
    pub fn with_defaults(defaults: EngineDefaults) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            defaults,
        }
    }

    /// Creates a session if missing, then delegates the config merge to it.
    pub async fn update_config(
        &self,
        namespace: &str,
        name: &str,
        update: SessionConfigUpdate,
    ) -> Result<()> {
        let session = self.get_or_create(namespace, name).await;
        session.configure(update).await
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Arc<SchedulerSession>> {
        let key = (namespace.to_string(), name.to_string());
        self.sessions
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound(namespace.to_string(), name.to_string()))
    }

    pub async fn latest(&self, namespace: &str, name: &str) -> Result<ScheduleSnapshot> {
        self.get(namespace, name).await?.latest().await
    }

    /// Stops the session's background loop and drops it from the registry.
    pub async fn remove(&self, namespace: &str, name: &str) -> Result<()> {
        let key = (namespace.to_string(), name.to_string());
        let session = self
            .sessions
            .write()
            .await
            .remove(&key)
            .ok_or_else(|| Error::NotFound(namespace.to_string(), name.to_string()))?;
        session.close().await;
        info!(namespace, name, "session removed");
        Ok(())
    }

    async fn get_or_create(&self, namespace: &str, name: &str) -> Arc<SchedulerSession> {
        let key = (namespace.to_string(), name.to_string());
        if let Some(session) = self.sessions.read().await.get(&key).cloned() {
            return session;
        }
        let mut guard = self.sessions.write().await;
        guard
            .entry(key)
            .or_insert_with(|| {
                info!(namespace, name, "creating session");
                SchedulerSession::with_defaults(namespace, name, self.defaults.clone())
            })
            .clone()
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlavourConfig;

    #[tokio::test]
    async fn update_config_creates_session_on_first_call() {
        let registry = SchedulerRegistry::new();
        registry
            .update_config(
                "ns",
                "svc",
                SessionConfigUpdate {
                    flavours: Some(vec![FlavourConfig {
                        name: "a".to_string(),
                        precision: 1.0,
                        carbon_intensity: Some(100.0),
                        enabled: Some(true),
                        annotations: None,
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(registry.get("ns", "svc").await.is_ok());
        registry.remove("ns", "svc").await.unwrap();
    }

    #[tokio::test]
    async fn get_unknown_session_is_not_found() {
        let registry = SchedulerRegistry::new();
        let result = registry.get("ns", "missing").await;
        assert!(matches!(result, Err(Error::NotFound(_, _))));
    }

    #[tokio::test]
    async fn remove_unknown_session_is_not_found() {
        let registry = SchedulerRegistry::new();
        let result = registry.remove("ns", "missing").await;
        assert!(matches!(result, Err(Error::NotFound(_, _))));
    }
}
