//! Push delivery handlers
//!
//! Receive channel messages from the relay. A malformed body answers 400 so
//! the relay drops it, an early delivery answers 419 so it is retried at its
//! start time, anything else that fails answers 500 and is redelivered.

use axum::{body::Bytes, extract::State, http::StatusCode};
use chrono::Utc;
use sluice_core::domain::task::TaskResult;
use sluice_core::dto::message::{self, StartPipelineMessage};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::dispatch_service;

/// POST /push/start-pipeline
pub async fn start_pipeline(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let request: StartPipelineMessage = message::decode(&body, Utc::now())?;

    let started = dispatch_service::start_pipelines(state.store.as_ref(), request).await?;

    if !started.is_empty() {
        tracing::info!("Started {} pipeline(s)", started.len());
    }

    Ok(StatusCode::OK)
}

/// POST /push/task-finished
pub async fn task_finished(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let result: TaskResult = message::decode(&body, Utc::now())?;

    dispatch_service::task_finished(state.store.as_ref(), result).await?;

    Ok(StatusCode::OK)
}
