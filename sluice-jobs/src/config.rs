//! Jobs service configuration
//!
//! Where to listen, where the controller lives and how long worker HTTP
//! calls may take.

use std::time::Duration;

/// Jobs service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the push endpoint binds to
    pub bind_addr: String,

    /// Controller base URL (e.g., "http://localhost:8080")
    pub controller_url: String,

    /// Timeout of HTTP calls made by workers
    pub worker_http_timeout: Duration,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - JOBS_BIND_ADDR (default: 0.0.0.0:8081)
    /// - CONTROLLER_URL (default: http://localhost:8080)
    /// - WORKER_HTTP_TIMEOUT (seconds, default: 60)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let worker_http_timeout = match std::env::var("WORKER_HTTP_TIMEOUT") {
            Ok(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| anyhow::anyhow!("WORKER_HTTP_TIMEOUT must be a number of seconds"))?,
            Err(_) => defaults.worker_http_timeout,
        };

        Ok(Self {
            bind_addr: std::env::var("JOBS_BIND_ADDR").unwrap_or(defaults.bind_addr),
            controller_url: std::env::var("CONTROLLER_URL").unwrap_or(defaults.controller_url),
            worker_http_timeout,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if !self.controller_url.starts_with("http://")
            && !self.controller_url.starts_with("https://")
        {
            anyhow::bail!("controller_url must start with http:// or https://");
        }

        if self.worker_http_timeout.is_zero() {
            anyhow::bail!("worker_http_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            controller_url: "http://localhost:8080".to_string(),
            worker_http_timeout: Duration::from_secs(60),
        }
    }
}
