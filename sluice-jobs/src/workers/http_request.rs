use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use sluice_core::domain::job::ParamType;

use crate::worker::{ParamSpec, Worker, WorkerContext, WorkerError, WorkerSpec};

/// Performs one HTTP call
///
/// A 4xx answer is a declared failure. Network errors and 5xx answers are
/// unexpected and retried.
pub struct HttpRequest;

impl HttpRequest {
    pub fn spec() -> WorkerSpec {
        WorkerSpec::new(
            "HttpRequest",
            "Sends an HTTP request",
            || -> Box<dyn Worker> { Box::new(HttpRequest) },
        )
        .param(ParamSpec::required("url", ParamType::String, "URL"))
        .param(ParamSpec::optional(
            "method",
            ParamType::String,
            Some(json!("GET")),
            "HTTP method",
        ))
        .param(ParamSpec::optional("body", ParamType::Text, None, "Request body"))
        .max_attempts(3)
    }
}

#[async_trait]
impl Worker for HttpRequest {
    async fn execute(&self, ctx: &mut WorkerContext) -> Result<(), WorkerError> {
        let url = ctx.str_param("url")?.to_string();
        let method_name = ctx.str_param("method")?.to_ascii_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| WorkerError::failure(format!("Invalid HTTP method '{}'", method_name)))?;

        let mut request = ctx.http().request(method.clone(), &url);
        if let Some(body) = ctx.param("body").and_then(|b| b.as_str()) {
            request = request.body(body.to_string());
        }

        ctx.log_info(format!("{} {}", method, url));

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status();

        if status.is_client_error() {
            return Err(WorkerError::failure(format!(
                "{} {} answered {}",
                method, url, status
            )));
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("{} {} answered {}", method, url, status).into());
        }

        ctx.log_info(format!("{} {} answered {}", method, url, status));
        Ok(())
    }
}
