//! HTTP fetch and parsing of provider-specific forecast schedules

use crate::carbon_aware::types::{CarbonProvider, ExtendedPoint, ForecastSlot, ForecastSnapshot};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

/// Fetches and parses one provider's carbon-intensity schedule into a `ForecastSnapshot`.
#[derive(Clone)]
pub struct ForecastClient {
    client: Client,
    provider: CarbonProvider,
    target: String,
}

impl ForecastClient {
    pub fn new(provider: CarbonProvider, target: String, timeout_seconds: f64) -> Self {
        let client = Client::builder()
            .timeout(StdDuration::from_secs_f64(timeout_seconds.max(0.1)))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            provider,
            target,
        }
    }

    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<ForecastSnapshot> {
        match &self.provider {
            CarbonProvider::Remote { url, token } => self.fetch_remote(url, token, now).await,
            CarbonProvider::Custom { url, auth_header } => {
                self.fetch_custom(url, auth_header, now).await
            }
            CarbonProvider::Mock => Ok(self.fetch_mock(now)),
        }
    }

    async fn fetch_remote(
        &self,
        base_url: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ForecastSnapshot> {
        let url = format!("{}/v3/carbon-intensity/forecast", base_url);
        let mut request = self.client.get(&url).query(&[("zone", &self.target)]);
        if !token.is_empty() {
            request = request.header("auth-token", token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Unavailable(format!(
                "forecast provider returned {}",
                response.status()
            )));
        }
        let json: Value = response.json().await?;

        let slots = json
            .get("forecast")
            .and_then(|f| f.as_array())
            .cloned()
            .unwrap_or_default();
        let schedule = parse_slots(&slots, "datetime", "carbonIntensity");

        info!(slots = schedule.len(), "fetched remote carbon forecast");
        Ok(assemble_snapshot(schedule, now))
    }

    async fn fetch_custom(
        &self,
        url: &str,
        auth_header: &Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ForecastSnapshot> {
        let mut request = self.client.get(url);
        if let Some(auth) = auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Unavailable(format!(
                "custom forecast endpoint returned {}",
                response.status()
            )));
        }
        let json: Value = response.json().await?;

        let slots = json
            .get("schedule")
            .and_then(|s| s.as_array())
            .cloned()
            .unwrap_or_default();
        let schedule = parse_slots(&slots, "timestamp", "intensity");

        info!(slots = schedule.len(), "fetched custom carbon forecast");
        Ok(assemble_snapshot(schedule, now))
    }

    /// Deterministic synthetic schedule: a gentle day/night sine pattern,
    /// cleanest at 03:00 UTC, dirtiest at 18:00 UTC, 30-minute slots for 48h.
    fn fetch_mock(&self, now: DateTime<Utc>) -> ForecastSnapshot {
        let base = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .unwrap_or(now);

        let mut schedule = Vec::with_capacity(96);
        for i in 0..96 {
            let from = base + Duration::minutes(30 * i);
            let to = from + Duration::minutes(30);
            let hour = from.timestamp() as f64 / 3600.0;
            let phase = (hour - 3.0) / 24.0 * std::f64::consts::TAU;
            let forecast = 225.0 + 100.0 * phase.cos();
            schedule.push(ForecastSlot {
                from,
                to,
                forecast: forecast.max(20.0),
                index: None,
            });
        }
        warn!("using mock forecast provider, no network request made");
        assemble_snapshot(schedule, now)
    }

    pub async fn health_check(&self) -> Result<bool> {
        match &self.provider {
            CarbonProvider::Remote { url, .. } => {
                let response = self.client.get(format!("{}/health", url)).send().await?;
                Ok(response.status().is_success())
            }
            CarbonProvider::Custom { url, .. } => {
                let response = self.client.get(url).send().await?;
                Ok(response.status().is_success())
            }
            CarbonProvider::Mock => Ok(true),
        }
    }
}

fn parse_slots(items: &[Value], time_key: &str, value_key: &str) -> Vec<ForecastSlot> {
    let mut slots = Vec::with_capacity(items.len());
    for item in items {
        let (Some(datetime), Some(intensity)) = (
            item.get(time_key).and_then(|v| v.as_str()),
            item.get(value_key).and_then(|v| v.as_f64()),
        ) else {
            continue;
        };
        let from = match DateTime::parse_from_rfc3339(datetime) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warn!("failed to parse forecast slot timestamp '{}': {}", datetime, e);
                continue;
            }
        };
        slots.push(ForecastSlot {
            to: from + Duration::minutes(30),
            from,
            forecast: intensity,
            index: item
                .get("index")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        });
    }
    slots
}

/// `intensity_now` is the slot containing `now`, `intensity_next` the
/// following slot. If only one slot is known, `intensity_next` copies it and
/// `forecast_degraded` is set.
fn assemble_snapshot(schedule: Vec<ForecastSlot>, now: DateTime<Utc>) -> ForecastSnapshot {
    let current_idx = schedule.iter().position(|s| s.from <= now && now < s.to);

    let (intensity_now, intensity_next, forecast_degraded) = match current_idx {
        Some(i) => {
            let now_val = schedule[i].forecast;
            match schedule.get(i + 1) {
                Some(next) => (now_val, next.forecast, false),
                None => (now_val, now_val, true),
            }
        }
        None => match schedule.first() {
            Some(first) => (first.forecast, first.forecast, true),
            None => (0.0, 0.0, true),
        },
    };

    let extended = schedule
        .iter()
        .map(|slot| ExtendedPoint {
            horizon_hours: (slot.from - now).num_minutes() as f64 / 60.0,
            intensity: slot.forecast,
        })
        .filter(|point| point.horizon_hours >= 0.0 && point.horizon_hours <= 48.0)
        .collect();

    ForecastSnapshot {
        intensity_now,
        intensity_next,
        schedule,
        extended,
        demand_now: None,
        demand_next: None,
        timestamp: Some(now),
        forecast_degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn mock_provider_never_reaches_network() {
        let client = ForecastClient::new(CarbonProvider::Mock, "national".to_string(), 2.0);
        let snapshot = client.fetch(Utc::now()).await.unwrap();
        assert_eq!(snapshot.schedule.len(), 96);
        assert!(snapshot.intensity_now > 0.0);
    }

    #[tokio::test]
    async fn custom_provider_parses_schedule_and_degrades_with_one_slot() {
        let server = MockServer::start().await;
        let now = Utc::now();
        let body = json!({
            "schedule": [
                { "timestamp": now.to_rfc3339(), "intensity": 180.0 }
            ]
        });
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = ForecastClient::new(
            CarbonProvider::Custom {
                url: format!("{}/forecast", server.uri()),
                auth_header: None,
            },
            "national".to_string(),
            2.0,
        );
        let snapshot = client.fetch(now).await.unwrap();
        assert_eq!(snapshot.intensity_now, 180.0);
        assert_eq!(snapshot.intensity_next, 180.0);
        assert!(snapshot.forecast_degraded);
    }

    #[tokio::test]
    async fn custom_provider_non_2xx_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ForecastClient::new(
            CarbonProvider::Custom {
                url: format!("{}/forecast", server.uri()),
                auth_header: None,
            },
            "national".to_string(),
            2.0,
        );
        let result = client.fetch(Utc::now()).await;
        assert!(matches!(result, Err(Error::Unavailable(_))));
    }

    #[test]
    fn assemble_snapshot_picks_current_and_next_slot() {
        let now = Utc::now();
        let schedule = vec![
            ForecastSlot {
                from: now - Duration::minutes(10),
                to: now + Duration::minutes(20),
                forecast: 100.0,
                index: None,
            },
            ForecastSlot {
                from: now + Duration::minutes(20),
                to: now + Duration::minutes(50),
                forecast: 150.0,
                index: None,
            },
        ];
        let snapshot = assemble_snapshot(schedule, now);
        assert_eq!(snapshot.intensity_now, 100.0);
        assert_eq!(snapshot.intensity_next, 150.0);
        assert!(!snapshot.forecast_degraded);
    }
}
