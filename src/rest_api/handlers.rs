//! HTTP handlers for the REST API

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, instrument};

use crate::config::SessionConfigUpdate;
use crate::error::Error;

use super::dto::{ManualOverrideRequest, ProblemDetail, ScheduleSnapshotWire, StatusResponse};
use super::server::ApiState;

#[instrument]
pub async fn healthz() -> Json<StatusResponse> {
    Json(StatusResponse::new("ok"))
}

#[cfg(feature = "metrics")]
pub async fn metrics() -> String {
    crate::metrics::encode()
}

#[cfg(not(feature = "metrics"))]
pub async fn metrics() -> String {
    String::new()
}

#[instrument(skip(state, update), fields(namespace = %namespace, name = %name))]
pub async fn update_config(
    State(state): State<Arc<ApiState>>,
    Path((namespace, name)): Path<(String, String)>,
    Json(mut update): Json<SessionConfigUpdate>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ProblemDetail>)> {
    if let Err(errors) = update.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ProblemDetail::from_validation_errors(errors)),
        ));
    }

    state
        .registry
        .update_config(&namespace, &name, update)
        .await
        .map_err(|e| {
            error!("config update failed for {}/{}: {}", namespace, name, e);
            (
                StatusCode::BAD_REQUEST,
                Json(ProblemDetail::from_message("config", e.to_string())),
            )
        })?;

    Ok(Json(StatusResponse::new("accepted")))
}

#[instrument(skip(state), fields(namespace = %namespace, name = %name))]
pub async fn remove_config(
    State(state): State<Arc<ApiState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<StatusResponse>)> {
    state
        .registry
        .remove(&namespace, &name)
        .await
        .map_err(|e| match e {
            Error::NotFound(_, _) => (
                StatusCode::NOT_FOUND,
                Json(StatusResponse::new("not_found")),
            ),
            other => {
                error!("failed to remove session {}/{}: {}", namespace, name, other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(StatusResponse::new("error")),
                )
            }
        })?;

    Ok(Json(StatusResponse::new("removed")))
}

#[instrument(skip(state), fields(namespace = %namespace, name = %name))]
pub async fn get_schedule(
    State(state): State<Arc<ApiState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ScheduleSnapshotWire>, (StatusCode, Json<StatusResponse>)> {
    match state.registry.latest(&namespace, &name).await {
        Ok(snapshot) => Ok(Json(snapshot.into())),
        Err(Error::Pending(_, _)) => Err((StatusCode::ACCEPTED, Json(StatusResponse::new("pending")))),
        Err(Error::NotFound(_, _)) => {
            Err((StatusCode::NOT_FOUND, Json(StatusResponse::new("not_found"))))
        }
        Err(other) => {
            error!("failed to read schedule {}/{}: {}", namespace, name, other);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::new("error")),
            ))
        }
    }
}

#[instrument(skip(state))]
pub async fn get_default_schedule(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ScheduleSnapshotWire>, (StatusCode, Json<StatusResponse>)> {
    let namespace = state.default_namespace.clone();
    let name = state.default_name.clone();
    get_schedule(State(state), Path((namespace, name))).await
}

#[instrument(skip(state, body), fields(namespace = %namespace, name = %name))]
pub async fn install_manual_override(
    State(state): State<Arc<ApiState>>,
    Path((namespace, name)): Path<(String, String)>,
    Json(body): Json<ManualOverrideRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<StatusResponse>)> {
    let session = state
        .registry
        .get(&namespace, &name)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, Json(StatusResponse::new(&e.to_string()))))?;

    session
        .install_override(body.flavour_weights, body.valid_until)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(StatusResponse::new(&e.to_string()))))?;

    Ok(Json(StatusResponse::new("accepted")))
}

#[instrument(skip(state, body))]
pub async fn install_default_manual_override(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<ManualOverrideRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<StatusResponse>)> {
    let namespace = state.default_namespace.clone();
    let name = state.default_name.clone();
    install_manual_override(State(state), Path((namespace, name)), Json(body)).await
}
