//! carbonsched entry point: starts the scheduler registry, the REST API,
//! and (optionally, on its own port) the metrics scrape endpoint.

use carbonsched::config::{EngineConfig, EngineDefaults, SessionConfigUpdate};
use carbonsched::registry::SchedulerRegistry;
use carbonsched::{telemetry, Error};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let engine_config = EngineConfig::parse();
    telemetry::init(&engine_config.log_level);

    info!(
        "starting carbonsched v{}",
        env!("CARGO_PKG_VERSION")
    );

    let registry = SchedulerRegistry::with_defaults(EngineDefaults::from(&engine_config));

    registry
        .update_config(
            &engine_config.default_namespace,
            &engine_config.default_name,
            SessionConfigUpdate {
                target_error: Some(engine_config.target_error),
                credit_min: Some(engine_config.credit_min),
                credit_max: Some(engine_config.credit_max),
                credit_window: Some(engine_config.credit_window),
                policy: Some(engine_config.policy.clone()),
                valid_for: Some(engine_config.schedule_valid_for),
                carbon_target: Some(engine_config.carbon_api_target.clone()),
                carbon_timeout: Some(engine_config.carbon_api_timeout),
                carbon_cache_ttl: Some(engine_config.carbon_api_cache_ttl),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| Error::Fatal(format!("failed to seed default session: {e}")))?;

    info!(
        namespace = %engine_config.default_namespace,
        name = %engine_config.default_name,
        "default session created"
    );

    #[cfg(feature = "rest-api")]
    {
        use carbonsched::rest_api::{run_metrics_server, run_server, ApiState};
        use std::sync::Arc;

        let api_state = Arc::new(ApiState {
            registry: registry.clone(),
            default_namespace: engine_config.default_namespace.clone(),
            default_name: engine_config.default_name.clone(),
        });

        if engine_config.metrics_port != engine_config.api_port {
            let metrics_port = engine_config.metrics_port;
            tokio::spawn(async move {
                if let Err(e) = run_metrics_server(metrics_port).await {
                    tracing::error!("metrics server error: {:?}", e);
                }
            });
        }

        run_server(api_state, engine_config.api_port).await?;
    }

    #[cfg(not(feature = "rest-api"))]
    {
        std::future::pending::<()>().await;
    }

    Ok(())
}
