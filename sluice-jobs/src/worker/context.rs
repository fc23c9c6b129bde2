//! Worker execution context
//!
//! Everything a worker sees during one run: its identifiers and resolved
//! parameters, a log sink, the enqueue side-channel, an HTTP client and a
//! cache scoped to the run.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use sluice_core::domain::log::{LogEntry, LogLevel};
use sluice_core::domain::task::{Task, WorkerParams, WorkerRequest};
use uuid::Uuid;

use crate::service::{InMemoryLogBuffer, LogBufferService};
use crate::worker::WorkerError;

/// Cache for repeated lookups within one worker run
///
/// Owned by the context and dropped with it, so nothing is shared between
/// runs.
#[derive(Debug, Default)]
pub struct WorkerCache {
    entries: HashMap<String, Value>,
}

impl WorkerCache {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Return the cached value, computing and storing it on a miss
    pub async fn get_or_try_insert_with<F, Fut, E>(&mut self, key: &str, f: F) -> Result<&Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value, E>>,
    {
        if !self.entries.contains_key(key) {
            let value = f().await?;
            self.entries.insert(key.to_string(), value);
        }
        // The key was inserted above if it was missing
        Ok(&self.entries[key])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct WorkerContext {
    pub pipeline_id: Uuid,
    pub job_id: Uuid,
    pub task_name: String,
    pub worker_class: String,
    pub params: WorkerParams,
    logs: InMemoryLogBuffer,
    enqueued: Vec<WorkerRequest>,
    cache: WorkerCache,
    http: reqwest::Client,
}

impl WorkerContext {
    /// Context for a task, starting from its raw parameters
    pub fn new(task: &Task, http: reqwest::Client) -> Self {
        Self {
            pipeline_id: task.pipeline_id,
            job_id: task.job_id,
            task_name: task.name.clone(),
            worker_class: task.worker_class.clone(),
            params: task.worker_params.clone(),
            logs: InMemoryLogBuffer::new(),
            enqueued: Vec::new(),
            cache: WorkerCache::default(),
            http,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn cache(&mut self) -> &mut WorkerCache {
        &mut self.cache
    }

    // =========================================================================
    // Logging
    // =========================================================================

    fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => tracing::debug!(task = %self.task_name, "{}", message),
            LogLevel::Info => tracing::info!(task = %self.task_name, "{}", message),
            LogLevel::Warning => tracing::warn!(task = %self.task_name, "{}", message),
            LogLevel::Error => tracing::error!(task = %self.task_name, "{}", message),
        }

        self.logs.add_entry(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
            task_name: Some(self.task_name.clone()),
        });
    }

    pub fn log_debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message.into());
    }

    pub fn log_info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message.into());
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into());
    }

    /// Take every entry logged so far
    pub fn drain_logs(&self) -> Vec<LogEntry> {
        self.logs.drain()
    }

    // =========================================================================
    // Follow-up work
    // =========================================================================

    /// Request another worker run for the same job once this one succeeds
    pub fn enqueue(&mut self, worker_class: impl Into<String>, params: WorkerParams, delay: u64) {
        self.enqueued.push(WorkerRequest {
            worker_class: worker_class.into(),
            params,
            delay,
        });
    }

    pub(crate) fn take_enqueued(&mut self) -> Vec<WorkerRequest> {
        std::mem::take(&mut self.enqueued)
    }

    // =========================================================================
    // Parameter access
    // =========================================================================

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    pub fn str_param(&self, name: &str) -> Result<&str, WorkerError> {
        self.param(name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(name))
    }

    pub fn f64_param(&self, name: &str) -> Result<f64, WorkerError> {
        self.param(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(name))
    }

    pub fn u64_param(&self, name: &str) -> Result<u64, WorkerError> {
        let value = self.f64_param(name)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(WorkerError::failure(format!(
                "parameter '{}' must be a non-negative integer",
                name
            )));
        }
        Ok(value as u64)
    }

    pub fn bool_param(&self, name: &str) -> Result<bool, WorkerError> {
        self.param(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> WorkerError {
    WorkerError::failure(format!("parameter '{}' is missing or has the wrong type", name))
}
