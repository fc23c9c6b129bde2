//! General settings endpoints

use crate::ControllerClient;
use crate::error::Result;
use sluice_core::domain::setting::GeneralSetting;
use sluice_core::dto::setting::PutSetting;

impl ControllerClient {
    /// List all general settings
    pub async fn list_settings(&self) -> Result<Vec<GeneralSetting>> {
        let url = self.url("/api/settings");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Create or replace a general setting
    pub async fn put_setting(&self, name: &str, value: impl Into<String>) -> Result<GeneralSetting> {
        let url = self.url(&format!("/api/settings/{}", name));
        let response = self
            .client
            .put(&url)
            .json(&PutSetting {
                value: value.into(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }
}
