//! Schedule ticker
//!
//! Once per minute publishes a `start-pipeline` message carrying the
//! `"scheduled"` selector and the minute it was issued for.

use std::sync::Arc;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use sluice_core::channel::{Channel, ChannelError, publish_message};
use sluice_core::dto::message::{StartPipelineMessage, StartPipelines, topics};
use tokio::time::Duration;
use tracing::{debug, error, info};

pub struct ScheduleTicker {
    channel: Arc<dyn Channel>,
}

impl ScheduleTicker {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Starts the ticker loop
    pub async fn run(self) {
        info!("Starting schedule ticker");

        loop {
            let now = Utc::now();
            let minute = next_minute(now);
            let wait = (minute - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            if let Err(e) = self.tick(minute).await {
                error!("Failed to publish scheduled start for {}: {}", minute, e);
            }
        }
    }

    /// Publish the start request for one minute
    pub async fn tick(&self, minute: DateTime<Utc>) -> Result<(), ChannelError> {
        debug!("Schedule tick at {}", minute);

        let message = StartPipelineMessage {
            pipelines: StartPipelines::Scheduled,
            scheduled_at: Some(minute),
        };

        publish_message(
            self.channel.as_ref(),
            topics::START_PIPELINE,
            &message,
            Duration::ZERO,
        )
        .await
    }
}

/// The first whole minute strictly after `now`
pub fn next_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    let minute = TimeDelta::minutes(1);
    now.duration_trunc(minute).unwrap_or(now) + minute
}
