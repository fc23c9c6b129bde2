//! Message channel abstraction
//!
//! The channel is durable, at-least-once and supports delayed delivery.
//! Publishing is the only operation services need; receiving happens as an
//! inbound push request to the subscriber of each topic.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish `data` to `topic`, to be delivered no earlier than `delay` from now
    async fn publish(&self, topic: &str, data: Value, delay: Duration) -> Result<(), ChannelError>;
}

/// Serialize `message` and publish it
pub async fn publish_message<T: Serialize + ?Sized>(
    channel: &dyn Channel,
    topic: &str,
    message: &T,
    delay: Duration,
) -> Result<(), ChannelError> {
    let data = serde_json::to_value(message)?;
    channel.publish(topic, data, delay).await
}

/// A message recorded by [`MemoryChannel`]
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub data: Value,
    pub delay: Duration,
}

/// In-process channel that records every publication
///
/// Nothing is delivered; callers drain the recorded messages and feed them to
/// the relevant handler themselves.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    published: Mutex<Vec<Published>>,
    unavailable: Mutex<bool>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap_or_else(|e| e.into_inner()) = unavailable;
    }

    /// All messages published so far
    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remove and return every message published to `topic`
    pub fn take(&self, topic: &str) -> Vec<Published> {
        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        let (taken, kept) = published.drain(..).partition(|m| m.topic == topic);
        *published = kept;
        taken
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn publish(&self, topic: &str, data: Value, delay: Duration) -> Result<(), ChannelError> {
        if *self.unavailable.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(ChannelError::Unavailable("memory channel disabled".to_string()));
        }

        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Published {
                topic: topic.to_string(),
                data,
                delay,
            });
        Ok(())
    }
}
