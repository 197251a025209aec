//! Observer control endpoints.
//!
//! `GET /observer/status` and the `POST /observer/*` actions. Every action
//! answers with the observer status after the action was applied.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use herakles_limit_notifier::{ObserverStatus, TickReport};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::state::SharedState;

/// Response body of a control action.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub action: &'static str,
    /// False if the action was a no-op (e.g. start while running).
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TickReport>,
    pub status: ObserverStatus,
}

async fn respond(
    state: &SharedState,
    action: &'static str,
    changed: bool,
    report: Option<TickReport>,
) -> Json<ActionResponse> {
    Json(ActionResponse {
        action,
        changed,
        report,
        status: state.observer.status().await,
    })
}

/// Handler for `GET /observer/status`.
#[instrument(skip(state))]
pub async fn status_handler(State(state): State<SharedState>) -> Json<ObserverStatus> {
    Json(state.observer.status().await)
}

/// Handler for `POST /observer/start`.
#[instrument(skip(state))]
pub async fn start_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.observer.start() {
        Ok(changed) => {
            info!("Observer start requested via API (changed: {})", changed);
            respond(&state, "start", changed, None).await.into_response()
        }
        Err(e) => {
            error!("Failed to start observer: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handler for `POST /observer/stop`.
#[instrument(skip(state))]
pub async fn stop_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let changed = state.observer.stop();
    info!("Observer stop requested via API (changed: {})", changed);
    respond(&state, "stop", changed, None).await
}

/// Handler for `POST /observer/restart`.
#[instrument(skip(state))]
pub async fn restart_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.observer.restart() {
        Ok(()) => {
            info!("Observer restarted via API");
            respond(&state, "restart", true, None).await.into_response()
        }
        Err(e) => {
            error!("Failed to restart observer: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handler for `POST /observer/reset`.
#[instrument(skip(state))]
pub async fn reset_handler(State(state): State<SharedState>) -> impl IntoResponse {
    state.observer.reset_notifications().await;
    respond(&state, "reset", true, None).await
}

/// Handler for `POST /observer/reset-stats`.
#[instrument(skip(state))]
pub async fn reset_stats_handler(State(state): State<SharedState>) -> impl IntoResponse {
    state.observer.reset_statistics();
    respond(&state, "reset-stats", true, None).await
}

/// Handler for `POST /observer/check`: runs one check cycle now.
#[instrument(skip(state))]
pub async fn check_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let report = state.observer.run_once().await;
    respond(&state, "check", true, Some(report)).await
}
