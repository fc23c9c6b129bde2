//! Sluice Jobs Service
//!
//! Executes tasks pushed by the message relay.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Worker: the worker contract, parameter resolution and the registry
//! - Workers: built-in worker implementations
//! - Services: task execution with its retry policy, log buffering and shipping
//! - API: push endpoint for task envelopes and the worker catalogue
//!
//! Results, retries and logs all go back through the controller.

mod api;
mod config;
mod service;
mod worker;
mod workers;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::service::TaskRunner;
use sluice_client::ControllerClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice_jobs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sluice jobs service");

    let config = Config::from_env()?;
    config.validate()?;
    info!(
        "Loaded configuration: bind_addr={}, controller_url={}",
        config.bind_addr, config.controller_url
    );

    let client = Arc::new(ControllerClient::new(config.controller_url.clone()));

    let worker_http = reqwest::Client::builder()
        .timeout(config.worker_http_timeout)
        .build()
        .context("Failed to build worker HTTP client")?;

    let registry = Arc::new(workers::builtin_registry());
    info!("Registered {} worker(s)", registry.len());
    for spec in registry.specs() {
        info!("  - {} (max attempts: {})", spec.name, spec.max_attempts);
    }

    let runner = TaskRunner::new(registry.clone(), client.clone(), client, worker_http);

    let app = api::create_router(api::AppState {
        runner: Arc::new(runner),
        registry,
    });

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
