//! API Module
//!
//! HTTP surface of the jobs service: task push deliveries and the worker
//! catalogue.

pub mod error;
pub mod health;
pub mod push;
pub mod workers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::TaskRunner;
use crate::worker::WorkerRegistry;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<TaskRunner>,
    pub registry: Arc<WorkerRegistry>,
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/workers", get(workers::list_workers))
        .route("/push/task", post(push::run_task))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
