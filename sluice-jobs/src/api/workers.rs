//! Worker catalogue

use axum::{Json, extract::State};

use crate::api::AppState;
use crate::worker::WorkerSpec;

/// GET /api/workers
/// Every registered worker with its parameter schema
pub async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerSpec>> {
    Json(state.registry.specs().cloned().collect())
}
