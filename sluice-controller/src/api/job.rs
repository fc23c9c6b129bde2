//! Job API Handlers
//!
//! HTTP endpoints for single jobs and their logs.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sluice_core::domain::job::Job;
use sluice_core::domain::log::LogEntry;
use sluice_core::dto::log::LogBatch;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{job_service, log_service, pipeline_service};

/// GET /api/job/{id}
/// Get job details by ID
pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = job_service::get_job(state.store.as_ref(), id).await?;

    Ok(Json(job))
}

/// DELETE /api/job/{id}
/// Remove a job and every start condition that refers to it
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting job: {}", id);

    pipeline_service::delete_job(state.store.as_ref(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/job/{id}/run
/// Run this job alone, without its dependents
pub async fn run_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Job>> {
    tracing::info!("Running single job: {}", id);

    let job = pipeline_service::start_single_job(state.store.as_ref(), id).await?;

    Ok(Json(job))
}

// =============================================================================
// Logs
// =============================================================================

/// GET /api/job/{id}/logs
pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    let logs = log_service::get_job_logs(state.store.as_ref(), id).await?;

    Ok(Json(logs))
}

/// POST /api/job/{id}/logs
/// Append a batch of log entries shipped by the jobs service
pub async fn add_job_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(batch): Json<LogBatch>,
) -> ApiResult<StatusCode> {
    tracing::debug!("Received {} log entries for job {}", batch.entries.len(), id);

    log_service::add_log_entries(state.store.as_ref(), id, batch.entries).await?;

    Ok(StatusCode::NO_CONTENT)
}
