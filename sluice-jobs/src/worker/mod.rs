//! Worker contract
//!
//! A worker is a named unit of work with a declared parameter schema. It
//! reads its resolved parameters from a [`WorkerContext`], logs through it,
//! and may request follow-up work through its enqueue side-channel.
//!
//! Failures come in two kinds: [`WorkerError::Failure`] is an expected,
//! declared failure that fails the job once, while
//! [`WorkerError::Unexpected`] goes through the task runner's retry policy.

pub mod context;
pub mod params;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sluice_core::domain::job::ParamType;
use sluice_core::domain::task::WorkerRequest;
use thiserror::Error;

pub use context::{WorkerCache, WorkerContext};
pub use params::ParamError;
pub use registry::{RegistryError, WorkerRegistry};

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Declared failure, never retried
    #[error("{0}")]
    Failure(String),

    /// Anything else, retried up to the worker's attempt budget
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl WorkerError {
    pub fn failure(message: impl Into<String>) -> Self {
        WorkerError::Failure(message.into())
    }
}

#[async_trait]
pub trait Worker: Send + Sync {
    async fn execute(&self, ctx: &mut WorkerContext) -> Result<(), WorkerError>;
}

/// Builds a fresh worker for one run
pub type WorkerFactory = fn() -> Box<dyn Worker>;

/// Declared metadata of a worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    /// General settings merged into the parameters before execution
    pub global_settings: Vec<&'static str>,
    /// Total attempts allowed on unexpected errors, 1 means no retry
    pub max_attempts: u32,
    #[serde(skip)]
    pub factory: WorkerFactory,
}

impl WorkerSpec {
    pub fn new(name: &'static str, description: &'static str, factory: WorkerFactory) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
            global_settings: Vec::new(),
            max_attempts: 1,
            factory,
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn global_setting(mut self, name: &'static str) -> Self {
        self.global_settings.push(name);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// One entry of a worker's parameter schema
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub label: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, param_type: ParamType, label: &'static str) -> Self {
        Self {
            name,
            param_type,
            required: true,
            default: None,
            label,
        }
    }

    pub fn optional(
        name: &'static str,
        param_type: ParamType,
        default: Option<Value>,
        label: &'static str,
    ) -> Self {
        Self {
            name,
            param_type,
            required: false,
            default,
            label,
        }
    }
}

/// Run a fresh worker for `spec` inside its context
///
/// Logs the start with the parameters and the completion, and returns the
/// follow-up work requested during the run. The general settings merged into
/// the parameters are left out of the log.
pub async fn execute(
    spec: &WorkerSpec,
    ctx: &mut WorkerContext,
) -> Result<Vec<WorkerRequest>, WorkerError> {
    let mut shown = ctx.params.clone();
    shown.retain(|name, _| !spec.global_settings.iter().any(|s| *s == name.as_str()));
    ctx.log_info(format!(
        "Executing {} with params {}",
        ctx.worker_class,
        Value::Object(shown)
    ));

    let worker = (spec.factory)();
    worker.execute(ctx).await?;

    let requests = ctx.take_enqueued();
    ctx.log_info(format!(
        "{} finished, {} follow-up task(s) requested",
        ctx.worker_class,
        requests.len()
    ));

    Ok(requests)
}
