use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod relay;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod store;

use config::Config;
use relay::{MessageRelay, PgChannel};
use scheduler::ScheduleTicker;
use store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sluice controller...");

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(PgStore::new(pool.clone()));
    let channel = Arc::new(PgChannel::new(pool.clone()));

    // Background delivery of channel messages
    let relay = MessageRelay::new(config.clone(), pool.clone())?;
    tokio::spawn(relay.run());

    if config.scheduler_enabled {
        tokio::spawn(ScheduleTicker::new(channel.clone()).run());
    } else {
        tracing::info!("Schedule ticker disabled");
    }

    // Build router with all API endpoints
    let app = api::create_router(api::AppState::new(store, channel));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");

    Ok(())
}
