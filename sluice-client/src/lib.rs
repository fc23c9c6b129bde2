//! Sluice HTTP Client
//!
//! A typed HTTP client for the Sluice controller API, shared by the CLI and
//! the jobs service.
//!
//! Besides the management endpoints, the client implements
//! [`sluice_core::channel::Channel`] by publishing through the controller's
//! channel endpoint, which is how services without database access put
//! messages on the channel.
//!
//! # Example
//!
//! ```no_run
//! use sluice_client::ControllerClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ControllerClient::new("http://localhost:8080");
//!
//!     for pipeline in client.list_pipelines().await? {
//!         println!("{} {}", pipeline.id, pipeline.status);
//!     }
//!     Ok(())
//! }
//! ```

mod channel;
pub mod error;
mod jobs;
mod pipelines;
mod settings;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Sluice controller API
///
/// Methods are organized into logical groups:
/// - Pipeline management and execution
/// - Jobs and job logs
/// - General settings
/// - Channel publishing
#[derive(Debug, Clone)]
pub struct ControllerClient {
    /// Base URL of the controller (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ControllerClient {
    /// Create a new controller client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new controller client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the controller
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-success status into an `ApiError` carrying the server's message
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(ClientError::api_error(status.as_u16(), extract_message(&error_text)))
}

/// Controller errors are `{"error": "..."}`; fall back to the raw body
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
