//! Dispatch control: start a run and poll its status.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use herald_common::error::AppError;
use herald_common::types::DispatchStatus;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/start_messaging", post(start_messaging))
        .route("/api/status", get(get_status))
}

/// POST /api/start_messaging: Start a run on the most recent upload.
///
/// Returns as soon as the worker is spawned; progress is read from `/api/status`.
async fn start_messaging(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.dispatcher.tracker().is_running() {
        return Err(AppError::Conflict(
            "Messaging is already in progress".to_string(),
        ));
    }

    let source = state
        .uploads
        .latest_csv()
        .await?
        .ok_or_else(|| AppError::Validation("Please upload a CSV file first".to_string()))?;

    // The dispatcher re-checks atomically; the check above only orders the errors
    state.dispatcher.start(source.clone())?;
    tracing::info!(source = %source.display(), "Messaging process started");

    Ok(Json(json!({ "success": "Messaging process started" })))
}

/// GET /api/status: Snapshot of the current run.
async fn get_status(State(state): State<AppState>) -> Json<DispatchStatus> {
    Json(state.dispatcher.status())
}
