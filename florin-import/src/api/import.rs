//! Import submission and status endpoints
//!
//! POST /import accepts a base64 CSV payload, registers a queued job, and
//! hands it to the in-process queue. GET /import/status and
//! GET /import/active read back job records.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use florin_common::jobs::ImportJob;

use crate::error::{ApiError, ApiResult};
use crate::services::csv_parser::validate_csv;
use crate::services::dedup::DEFAULT_DEDUPLICATE_THRESHOLD;
use crate::services::worker::ImportPayload;
use crate::AppState;

/// POST /import request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// Base64-encoded CSV file content
    pub csv_content: String,
    pub file_name: String,
    /// Similarity cutoff for the dedup policy, 0-100
    #[serde(default)]
    pub deduplicate_threshold: Option<u8>,
}

/// POST /import response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub job_id: Uuid,
}

/// GET /import/active response
#[derive(Debug, Serialize)]
pub struct ActiveJobsResponse {
    pub jobs: Vec<ImportJob>,
}

/// POST /import
///
/// Validates the payload up front so malformed submissions fail with 400
/// before a job record exists. Re-submitting a file name that is still
/// queued or processing returns the existing job instead of starting a
/// second run over the same file.
pub async fn submit_import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResponse>> {
    if request.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("fileName must not be empty".to_string()));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(request.csv_content.trim())
        .map_err(|e| ApiError::BadRequest(format!("csvContent is not valid base64: {}", e)))?;
    let text = String::from_utf8(decoded)
        .map_err(|e| ApiError::BadRequest(format!("csvContent is not valid UTF-8: {}", e)))?;
    validate_csv(&text).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let active = state.job_store.list_active().await?;
    if let Some(existing) = active.iter().find(|job| job.file_name == request.file_name) {
        tracing::info!(
            job_id = %existing.job_id,
            file = %request.file_name,
            "Returning already-active job for resubmitted file"
        );
        return Ok(Json(ImportResponse {
            success: true,
            job_id: existing.job_id,
        }));
    }

    let job = ImportJob::queued(Uuid::new_v4(), request.file_name.clone());
    if let Err(e) = state.job_store.insert(&job).await {
        *state.last_error.write().await = Some(e.to_string());
        return Err(e.into());
    }

    state.queue.enqueue(ImportPayload {
        job_id: job.job_id,
        file_name: request.file_name,
        csv_content: request.csv_content,
        deduplicate_threshold: request
            .deduplicate_threshold
            .unwrap_or(DEFAULT_DEDUPLICATE_THRESHOLD),
    })?;

    tracing::info!(job_id = %job.job_id, file = %job.file_name, "Import job accepted");

    Ok(Json(ImportResponse {
        success: true,
        job_id: job.job_id,
    }))
}

/// GET /import/status/:job_id
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    match state.job_store.get_status(job_id).await? {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::NotFound(format!("Job not found: {}", job_id))),
    }
}

/// GET /import/active
pub async fn active_jobs(State(state): State<AppState>) -> ApiResult<Json<ActiveJobsResponse>> {
    let jobs = state.job_store.list_active().await?;
    Ok(Json(ActiveJobsResponse { jobs }))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(submit_import))
        .route("/import/status/:job_id", get(job_status))
        .route("/import/active", get(active_jobs))
}
