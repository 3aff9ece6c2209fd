//! Template and settings routes.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use herald_common::error::AppError;
use herald_common::types::{Settings, TemplateSet};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/config", get(get_config))
        .route("/api/save_templates", post(save_templates))
}

/// Body of a save request. Missing fields save as empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SaveConfigParams {
    pub active_template: String,
    pub inactive_template: String,
    pub no_instruction_template: String,
    pub notification_contact1: String,
    pub notification_contact2: String,
    pub user_data_type: Option<String>,
}

/// GET /api/config: Current settings and the three templates.
async fn get_config(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let settings = state.settings.load().await?;
    let templates = state.templates.load_all().await?;

    Ok(Json(json!({
        "config": settings,
        "templates": {
            "active_message": templates.active,
            "inactive_message": templates.inactive,
            "no_instruction_message": templates.no_instruction,
        }
    })))
}

/// POST /api/save_templates: Overwrite templates and settings.
async fn save_templates(
    State(state): State<AppState>,
    Json(params): Json<SaveConfigParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let templates = TemplateSet {
        active: params.active_template,
        inactive: params.inactive_template,
        no_instruction: params.no_instruction_template,
    };
    let settings = Settings {
        notification_contact1: params.notification_contact1,
        notification_contact2: params.notification_contact2,
        user_data_type: params
            .user_data_type
            .unwrap_or_else(|| Settings::default().user_data_type),
    };

    state.templates.save(&templates).await?;
    state.settings.save(&settings).await?;
    tracing::info!("Configuration saved");

    Ok(Json(json!({ "success": "Configuration saved successfully" })))
}
