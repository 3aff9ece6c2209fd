//! Liveness plus a one-line view of the dispatcher.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.dispatcher.status();
    Json(json!({
        "status": "ok",
        "service": "hearing-herald-api",
        "version": env!("CARGO_PKG_VERSION"),
        "dispatch": {
            "is_running": status.is_running,
            "phase": status.phase,
        }
    }))
}
