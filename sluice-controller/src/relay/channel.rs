//! Postgres-backed channel publisher

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sluice_core::channel::{Channel, ChannelError};
use sluice_core::dto::message::topics;
use sqlx::PgPool;

use crate::repository::message_repository;

/// Publishes by inserting into `channel_messages`
#[derive(Debug, Clone)]
pub struct PgChannel {
    pool: PgPool,
}

impl PgChannel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Channel for PgChannel {
    async fn publish(&self, topic: &str, data: Value, delay: Duration) -> Result<(), ChannelError> {
        if !topics::is_known(topic) {
            return Err(ChannelError::UnknownTopic(topic.to_string()));
        }

        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| ChannelError::Unavailable(format!("invalid delay: {}", e)))?;
        let start_time = Utc::now() + delay;

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        let id = message_repository::insert(&mut *conn, topic, &data, start_time)
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        tracing::debug!("Stored message {} on '{}' for {}", id, topic, start_time);

        Ok(())
    }
}
