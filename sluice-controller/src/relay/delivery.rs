//! Message relay
//!
//! Polls `channel_messages` for due rows and pushes each one to the
//! subscriber of its topic. Delivery is at-least-once: a message is only
//! deleted after its subscriber accepted it or rejected it permanently.

use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use sluice_core::dto::message::{ChannelMessage, MessageAttributes, PushRequest, topics};
use sqlx::PgPool;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::repository::message_repository::{self, MessageRow};

/// Longest wait between two redeliveries of a failing message
const MAX_REDELIVERY_DELAY: Duration = Duration::from_secs(600);

/// What to do with a message after a push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Accepted by the subscriber
    Delivered,
    /// Delivered before its start time, try again at the start time
    TooEarly,
    /// Permanently rejected
    Rejected,
    /// Subscriber or network failure, redeliver with backoff
    Retry,
}

impl Outcome {
    /// Classify a push response; `None` means no response was received
    pub fn classify(status: Option<StatusCode>) -> Self {
        match status {
            Some(status) if status.is_success() => Outcome::Delivered,
            Some(status) if status.as_u16() == 419 => Outcome::TooEarly,
            Some(status) if status.is_client_error() => Outcome::Rejected,
            _ => Outcome::Retry,
        }
    }
}

/// Backoff before redelivering a message that failed `attempts` times
///
/// Starts at one second and doubles up to ten minutes.
pub fn redelivery_delay(attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    Duration::from_secs(1u64 << exponent).min(MAX_REDELIVERY_DELAY)
}

/// Pushes stored channel messages to their subscribers
pub struct MessageRelay {
    config: Config,
    pool: PgPool,
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
}

impl MessageRelay {
    /// Creates a new relay
    pub fn new(config: Config, pool: PgPool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.relay_push_timeout)
            .build()
            .context("Failed to build push client")?;
        let semaphore = Arc::new(Semaphore::new(config.relay_max_in_flight));

        Ok(Self {
            config,
            pool,
            http,
            semaphore,
        })
    }

    /// Starts the relay loop
    pub async fn run(self) {
        info!(
            "Starting message relay (interval: {:?}, batch: {}, in flight: {})",
            self.config.relay_poll_interval,
            self.config.relay_batch_size,
            self.config.relay_max_in_flight
        );

        let mut interval = time::interval(self.config.relay_poll_interval);

        loop {
            interval.tick().await;

            match self.relay_once().await {
                Ok(claimed) => {
                    if claimed > 0 {
                        debug!("Relayed {} message(s) this cycle", claimed);
                    }
                }
                Err(e) => {
                    error!("Error during relay cycle: {:#}", e);
                }
            }
        }
    }

    /// Claims one batch of due messages and hands each to a delivery task
    async fn relay_once(&self) -> Result<usize> {
        let available = self.semaphore.available_permits() as i64;
        if available == 0 {
            debug!("Max in-flight deliveries reached, waiting");
            return Ok(0);
        }

        let messages = message_repository::claim_due(
            &self.pool,
            available.min(self.config.relay_batch_size),
            self.config.relay_lease,
        )
        .await
        .context("Failed to claim due messages")?;

        let claimed = messages.len();

        for message in messages {
            // A message claimed without a permit stays leased and is picked up
            // again once its lease expires.
            match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => self.spawn_delivery(message, permit),
                Err(_) => debug!("No delivery slot for message {}", message.id),
            }
        }

        Ok(claimed)
    }

    fn spawn_delivery(&self, message: MessageRow, _permit: OwnedSemaphorePermit) {
        let pool = self.pool.clone();
        let http = self.http.clone();
        let url = self.subscriber_url(&message.topic);

        tokio::spawn(async move {
            let id = message.id;
            if let Err(e) = deliver(&pool, &http, url, message).await {
                error!("Failed to settle message {}: {:#}", id, e);
            }
            // Permit is automatically released when dropped
        });
    }

    /// Push endpoint of the subscriber of a topic
    fn subscriber_url(&self, topic: &str) -> Option<String> {
        let (base, path) = match topic {
            topics::TASKS => (&self.config.jobs_push_url, "/push/task"),
            topics::TASK_FINISHED => (&self.config.controller_push_url, "/push/task-finished"),
            topics::START_PIPELINE => (&self.config.controller_push_url, "/push/start-pipeline"),
            _ => return None,
        };

        Some(format!("{}{}", base.trim_end_matches('/'), path))
    }
}

/// Push one message and settle it according to the response
async fn deliver(
    pool: &PgPool,
    http: &reqwest::Client,
    url: Option<String>,
    message: MessageRow,
) -> Result<()> {
    let Some(url) = url else {
        error!(
            "Dropping message {} on unknown topic '{}'",
            message.id, message.topic
        );
        return message_repository::delete(pool, message.id)
            .await
            .context("Failed to delete message");
    };

    let body = PushRequest {
        message: ChannelMessage {
            message_id: message.id.to_string(),
            topic: message.topic.clone(),
            data: message.data.clone(),
            attributes: MessageAttributes {
                start_time: message.start_time.timestamp(),
            },
        },
    };

    let status = match http.post(&url).json(&body).send().await {
        Ok(response) => Some(response.status()),
        Err(e) => {
            warn!("Push of message {} to {} failed: {}", message.id, url, e);
            None
        }
    };

    match Outcome::classify(status) {
        Outcome::Delivered => {
            debug!("Message {} delivered to {}", message.id, url);
            message_repository::delete(pool, message.id).await?;
        }
        Outcome::TooEarly => {
            let retry_at = too_early_retry_at(message.start_time, Utc::now());
            debug!("Message {} is early, retrying at {}", message.id, retry_at);
            message_repository::reschedule(pool, message.id, retry_at, false).await?;
        }
        Outcome::Rejected => {
            error!(
                "Subscriber {} rejected message {} on '{}' ({:?}), dropping it",
                url, message.id, message.topic, status
            );
            message_repository::delete(pool, message.id).await?;
        }
        Outcome::Retry => {
            let attempts = u32::try_from(message.attempts).unwrap_or(0).saturating_add(1);
            let delay = redelivery_delay(attempts);
            warn!(
                "Delivery of message {} failed ({:?}), attempt {}, retrying in {:?}",
                message.id, status, attempts, delay
            );
            let retry_at = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(1));
            message_repository::reschedule(pool, message.id, retry_at, true).await?;
        }
    }

    Ok(())
}

/// A too-early message is retried at its start time, but never immediately
fn too_early_retry_at(start_time: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    start_time.max(now + chrono::Duration::seconds(1))
}
