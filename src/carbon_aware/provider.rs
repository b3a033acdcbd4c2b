//! TTL-cached forecast sampling with a bounded-latency, typed failure mode
//!
//! Mirrors the refresh-and-cache shape of a node-region carbon scorer: a
//! single `RwLock`-guarded cache entry, refreshed on demand rather than by a
//! background task, since the session's own evaluation loop already ticks on
//! its configured interval.

use crate::carbon_aware::api::ForecastClient;
use crate::carbon_aware::types::{CarbonAwareConfig, ForecastSnapshot};
use crate::error::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{self, Duration, Instant};
use tracing::warn;

struct Cached {
    snapshot: ForecastSnapshot,
    fetched_at: Instant,
}

/// Fetches and caches carbon-intensity forecasts, bounding every fetch by
/// `carbon_timeout` and falling back to a stale cache entry before giving up.
pub struct ForecastProvider {
    inner: RwLock<Inner>,
}

struct Inner {
    client: ForecastClient,
    cache_ttl: Duration,
    timeout: Duration,
    cached: Option<Cached>,
}

impl ForecastProvider {
    pub fn new(config: CarbonAwareConfig) -> Self {
        let client = ForecastClient::new(
            config.provider.clone(),
            config.carbon_target.clone(),
            config.carbon_timeout,
        );
        Self {
            inner: RwLock::new(Inner {
                client,
                cache_ttl: Duration::from_secs(config.carbon_cache_ttl),
                timeout: Duration::from_secs_f64(config.carbon_timeout.max(0.1)),
                cached: None,
            }),
        }
    }

    /// Replaces the provider configuration; invalidates the cache so the next
    /// `sample` call observes the new source immediately.
    pub async fn configure(&self, config: CarbonAwareConfig) {
        let client = ForecastClient::new(
            config.provider.clone(),
            config.carbon_target.clone(),
            config.carbon_timeout,
        );
        let mut guard = self.inner.write().await;
        guard.client = client;
        guard.cache_ttl = Duration::from_secs(config.carbon_cache_ttl);
        guard.timeout = Duration::from_secs_f64(config.carbon_timeout.max(0.1));
        guard.cached = None;
    }

    /// Returns a fresh or cached-within-TTL `ForecastSnapshot`, or
    /// `Error::Unavailable` if the fetch exceeds `carbon_timeout` and no
    /// cached sample remains valid.
    pub async fn sample(&self) -> Result<ForecastSnapshot> {
        {
            let guard = self.inner.read().await;
            if let Some(cached) = &guard.cached {
                if cached.fetched_at.elapsed() < guard.cache_ttl {
                    return Ok(cached.snapshot.clone());
                }
            }
        }

        let mut guard = self.inner.write().await;
        if let Some(cached) = &guard.cached {
            if cached.fetched_at.elapsed() < guard.cache_ttl {
                return Ok(cached.snapshot.clone());
            }
        }

        let now = Utc::now();
        match time::timeout(guard.timeout, guard.client.fetch(now)).await {
            Ok(Ok(snapshot)) => {
                guard.cached = Some(Cached {
                    snapshot: snapshot.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(snapshot)
            }
            Ok(Err(e)) => {
                warn!("forecast fetch failed: {}", e);
                self.stale_or_unavailable(guard.cached.as_ref(), e)
            }
            Err(_) => {
                warn!("forecast fetch exceeded carbon_timeout");
                self.stale_or_unavailable(
                    guard.cached.as_ref(),
                    Error::Unavailable("forecast fetch timed out".to_string()),
                )
            }
        }
    }

    fn stale_or_unavailable(&self, cached: Option<&Cached>, err: Error) -> Result<ForecastSnapshot> {
        match cached {
            Some(cached) => Ok(cached.snapshot.clone()),
            None => Err(err),
        }
    }
}

/// Shared handle suitable for passing into a session and, when the same
/// `carbon_target` is reused, across sessions.
pub type SharedForecastProvider = Arc<ForecastProvider>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbon_aware::types::CarbonProvider;

    #[tokio::test]
    async fn mock_provider_samples_without_network() {
        let provider = ForecastProvider::new(CarbonAwareConfig {
            provider: CarbonProvider::Mock,
            ..Default::default()
        });
        let snapshot = provider.sample().await.unwrap();
        assert!(!snapshot.schedule.is_empty());
    }

    #[tokio::test]
    async fn second_sample_within_ttl_is_served_from_cache() {
        let provider = ForecastProvider::new(CarbonAwareConfig {
            provider: CarbonProvider::Mock,
            carbon_cache_ttl: 300,
            ..Default::default()
        });
        let first = provider.sample().await.unwrap();
        let second = provider.sample().await.unwrap();
        assert_eq!(first.timestamp, second.timestamp);
    }

    #[tokio::test]
    async fn configure_invalidates_cache() {
        let provider = ForecastProvider::new(CarbonAwareConfig {
            provider: CarbonProvider::Mock,
            ..Default::default()
        });
        provider.sample().await.unwrap();
        provider
            .configure(CarbonAwareConfig {
                provider: CarbonProvider::Mock,
                carbon_cache_ttl: 1,
                ..Default::default()
            })
            .await;
        // cache was cleared; sampling again must not panic and must succeed
        let snapshot = provider.sample().await.unwrap();
        assert!(snapshot.intensity_now >= 0.0);
    }
}
