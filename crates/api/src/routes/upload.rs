//! Recipient file upload.

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use herald_common::error::AppError;
use herald_common::store::UploadStore;
use herald_engine::loader;

use crate::state::AppState;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "csv_file";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/upload_csv", post(upload_csv))
}

/// POST /api/upload_csv: Store a recipient CSV after checking its columns.
///
/// A file that fails the schema check is not stored, so it can never become
/// the source of the next run.
async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }
        if !UploadStore::is_allowed(&filename) {
            return Err(AppError::Validation("Invalid file format".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?;
        let rows = loader::inspect(bytes.as_ref())?;
        let path = state.uploads.save(&filename, &bytes).await?;

        tracing::info!(path = %path.display(), rows, "Recipient file accepted");
        return Ok(Json(json!({
            "success": "CSV uploaded successfully",
            "rows": rows
        })));
    }

    Err(AppError::Validation("No file selected".to_string()))
}
