//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline management and the pipeline state machine.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sluice_core::domain::job::Job;
use sluice_core::domain::pipeline::Pipeline;
use sluice_core::dto::pipeline::{CreateJob, CreatePipeline, PipelineDetails};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::pipeline_service;

// =============================================================================
// Management
// =============================================================================

/// POST /api/pipeline/create
/// Create a new pipeline together with its jobs
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<PipelineDetails>)> {
    tracing::info!("Creating pipeline: {}", req.name);

    let details = pipeline_service::create_pipeline(state.store.as_ref(), req).await?;

    Ok((StatusCode::CREATED, Json(details)))
}

/// GET /api/pipeline/list
/// List all pipelines
pub async fn list_pipelines(State(state): State<AppState>) -> ApiResult<Json<Vec<Pipeline>>> {
    let pipelines = pipeline_service::list_pipelines(state.store.as_ref()).await?;

    Ok(Json(pipelines))
}

/// GET /api/pipeline/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineDetails>> {
    tracing::debug!("Getting pipeline: {}", id);

    let details = pipeline_service::get_pipeline(state.store.as_ref(), id).await?;

    Ok(Json(details))
}

/// DELETE /api/pipeline/{id}
/// Delete a pipeline; rejected while it is running or stopping
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    pipeline_service::delete_pipeline(state.store.as_ref(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/pipeline/{id}/jobs
/// Add a job to an existing pipeline
pub async fn add_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    tracing::info!("Adding job '{}' to pipeline {}", req.name, id);

    let job = pipeline_service::add_job(state.store.as_ref(), id, req).await?;

    Ok((StatusCode::CREATED, Json(job)))
}

// =============================================================================
// Execution
// =============================================================================

/// POST /api/pipeline/{id}/start
pub async fn start_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Starting pipeline: {}", id);

    let pipeline = pipeline_service::start(state.store.as_ref(), id).await?;

    Ok(Json(pipeline))
}

/// POST /api/pipeline/{id}/stop
pub async fn stop_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Stopping pipeline: {}", id);

    let pipeline = pipeline_service::stop(state.store.as_ref(), id).await?;

    Ok(Json(pipeline))
}
