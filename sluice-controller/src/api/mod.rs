//! API Module
//!
//! HTTP API layer for the controller.
//! Each submodule handles endpoints for a specific domain; `push` receives
//! deliveries from the message relay.

pub mod channel;
pub mod error;
pub mod health;
pub mod job;
pub mod pipeline;
pub mod push;
pub mod settings;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sluice_core::channel::Channel;
use tower_http::trace::TraceLayer;

use crate::store::Store;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub channel: Arc<dyn Channel>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, channel: Arc<dyn Channel>) -> Self {
        Self { store, channel }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/api/pipeline/create", post(pipeline::create_pipeline))
        .route("/api/pipeline/list", get(pipeline::list_pipelines))
        .route(
            "/api/pipeline/{id}",
            get(pipeline::get_pipeline).delete(pipeline::delete_pipeline),
        )
        .route("/api/pipeline/{id}/start", post(pipeline::start_pipeline))
        .route("/api/pipeline/{id}/stop", post(pipeline::stop_pipeline))
        .route("/api/pipeline/{id}/jobs", post(pipeline::add_job))
        // Job endpoints
        .route("/api/job/{id}", get(job::get_job).delete(job::delete_job))
        .route("/api/job/{id}/run", post(job::run_job))
        .route(
            "/api/job/{id}/logs",
            get(job::get_job_logs).post(job::add_job_logs),
        )
        // General settings
        .route("/api/settings", get(settings::list_settings))
        .route("/api/settings/{name}", put(settings::put_setting))
        // Channel publishing for other services
        .route("/api/channel/{topic}", post(channel::publish))
        // Push deliveries from the relay
        .route("/push/start-pipeline", post(push::start_pipeline))
        .route("/push/task-finished", post(push::task_finished))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
