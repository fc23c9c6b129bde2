//! Channel publishing through the controller

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sluice_core::channel::{Channel, ChannelError};
use sluice_core::dto::message::PublishRequest;

use crate::ControllerClient;
use crate::error::{ClientError, Result};

impl ControllerClient {
    /// Publish a message onto the controller's durable channel
    pub async fn publish(&self, topic: &str, data: Value, delay: Duration) -> Result<()> {
        let url = self.url(&format!("/api/channel/{}", topic));
        let req = PublishRequest {
            data,
            delay_seconds: delay.as_secs(),
        };
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_empty_response(response).await
    }
}

#[async_trait]
impl Channel for ControllerClient {
    async fn publish(&self, topic: &str, data: Value, delay: Duration) -> std::result::Result<(), ChannelError> {
        ControllerClient::publish(self, topic, data, delay)
            .await
            .map_err(|e| match e {
                ClientError::ApiError { status: 400, .. } => {
                    ChannelError::UnknownTopic(topic.to_string())
                }
                other => ChannelError::Unavailable(other.to_string()),
            })
    }
}
