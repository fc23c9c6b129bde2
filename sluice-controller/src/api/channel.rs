//! Channel publishing endpoint
//!
//! Lets services without database access (the jobs service) publish onto the
//! durable channel.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sluice_core::channel::ChannelError;
use sluice_core::dto::message::{PublishRequest, topics};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /api/channel/{topic}
pub async fn publish(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Json(req): Json<PublishRequest>,
) -> ApiResult<StatusCode> {
    if !topics::is_known(&topic) {
        return Err(ApiError::BadRequest(format!("Unknown topic '{}'", topic)));
    }

    tracing::debug!(
        "Publishing to '{}' with a delay of {}s",
        topic,
        req.delay_seconds
    );

    state
        .channel
        .publish(&topic, req.data, Duration::from_secs(req.delay_seconds))
        .await
        .map_err(|e| match e {
            ChannelError::UnknownTopic(topic) => {
                ApiError::BadRequest(format!("Unknown topic '{}'", topic))
            }
            other => ApiError::InternalError(other.to_string()),
        })?;

    Ok(StatusCode::ACCEPTED)
}
