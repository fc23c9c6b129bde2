//! Task push handler

use axum::{body::Bytes, extract::State, http::StatusCode};
use chrono::Utc;
use sluice_core::domain::task::Task;
use sluice_core::dto::message;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /push/task
///
/// Answers 400 for a malformed envelope, 419 before the start time and 500
/// when the outcome could not be published, so the task is delivered again.
pub async fn run_task(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let task: Task = message::decode(&body, Utc::now())?;

    let outcome = state.runner.run(task).await?;
    tracing::debug!("Task finished with {:?}", outcome);

    Ok(StatusCode::OK)
}
