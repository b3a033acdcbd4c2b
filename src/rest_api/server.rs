//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::registry::SchedulerRegistry;
use crate::{Error, Result};

use super::handlers;

#[derive(Clone)]
pub struct ApiState {
    pub registry: SchedulerRegistry,
    pub default_namespace: String,
    pub default_name: String,
}

/// Runs the config/schedule/health API on `api_port`. `/metrics` is mounted
/// on the same router; deployments wanting it on a separate listener
/// run `run_metrics_server` on `metrics_port` instead and rely on both
/// endpoints serving the same underlying registry.
pub async fn run_server(state: Arc<ApiState>, api_port: u16) -> Result<()> {
    let app = Router::new()
        .route("/config/:namespace/:name", put(handlers::update_config))
        .route("/config/:namespace/:name", delete(handlers::remove_config))
        .route("/schedule/:namespace/:name", get(handlers::get_schedule))
        .route("/schedule", get(handlers::get_default_schedule))
        .route(
            "/schedule/:namespace/:name/manual",
            post(handlers::install_manual_override),
        )
        .route(
            "/setschedule",
            post(handlers::install_default_manual_override),
        )
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    info!("REST API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Fatal(format!("failed to bind API port {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Fatal(format!("API server error: {}", e)))?;

    Ok(())
}

/// Runs a standalone `/metrics` listener on `metrics_port`, for deployments
/// that want the scrape endpoint on its own port.
pub async fn run_metrics_server(metrics_port: u16) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
    info!("metrics server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Fatal(format!("failed to bind metrics port {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Fatal(format!("metrics server error: {}", e)))?;

    Ok(())
}
