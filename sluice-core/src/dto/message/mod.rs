//! Channel message envelopes
//!
//! Every message delivered by the channel arrives as a push request wrapping
//! the payload together with a `start_time` attribute (epoch seconds). A
//! message received before its start time must be rejected so the channel
//! delivers it again later.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Channel topic names
pub mod topics {
    /// Task envelopes, consumed by the jobs service
    pub const TASKS: &str = "tasks";
    /// Result envelopes, consumed by the controller
    pub const TASK_FINISHED: &str = "task-finished";
    /// Start requests, consumed by the controller
    pub const START_PIPELINE: &str = "start-pipeline";

    pub const ALL: [&str; 3] = [TASKS, TASK_FINISHED, START_PIPELINE];

    pub fn is_known(topic: &str) -> bool {
        ALL.contains(&topic)
    }
}

/// A message as delivered to a subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub message_id: String,
    pub topic: String,
    pub data: Value,
    pub attributes: MessageAttributes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MessageAttributes {
    /// Earliest delivery time, epoch seconds
    pub start_time: i64,
}

/// Body of a push delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub message: ChannelMessage,
}

/// Request body for publishing through the controller's channel endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub data: Value,
    #[serde(default)]
    pub delay_seconds: u64,
}

/// Why a push delivery was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The body can never be processed; the channel should drop it
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Delivered before its start time; the channel should retry later
    #[error("message delivered before its start time {start_time}")]
    TooEarly { start_time: i64 },
}

/// Decode a push delivery into its payload
///
/// The envelope is validated first, then the start time, then the payload.
pub fn decode<T: DeserializeOwned>(body: &[u8], now: DateTime<Utc>) -> Result<T, PushError> {
    let request: PushRequest =
        serde_json::from_slice(body).map_err(|e| PushError::Malformed(e.to_string()))?;

    let start_time = request.message.attributes.start_time;
    if now.timestamp() < start_time {
        return Err(PushError::TooEarly { start_time });
    }

    serde_json::from_value(request.message.data).map_err(|e| PushError::Malformed(e.to_string()))
}

/// Which pipelines a start request refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPipelines {
    /// Every schedule-enabled pipeline that is due at the reference time
    Scheduled,
    /// An explicit list of pipeline ids
    Ids(Vec<Uuid>),
}

const SCHEDULED: &str = "scheduled";

impl Serialize for StartPipelines {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StartPipelines::Scheduled => serializer.serialize_str(SCHEDULED),
            StartPipelines::Ids(ids) => ids.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StartPipelines {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Keyword(String),
            Ids(Vec<Uuid>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Keyword(keyword) if keyword == SCHEDULED => Ok(StartPipelines::Scheduled),
            Raw::Keyword(other) => Err(D::Error::custom(format!(
                "unknown pipeline selector: {other}"
            ))),
            Raw::Ids(ids) => Ok(StartPipelines::Ids(ids)),
        }
    }
}

/// Payload of the start-pipeline topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPipelineMessage {
    pub pipelines: StartPipelines,
    /// Reference time for schedule matching; "now" when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
}
