//! Task and result envelopes
//!
//! A [`Task`] carries one attempt of a job's worker from the controller to the
//! jobs service. A [`TaskResult`] carries the outcome back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Worker parameters keyed by name
pub type WorkerParams = Map<String, Value>;

/// General settings keyed by name
pub type GeneralSettings = BTreeMap<String, String>;

/// One dispatched attempt to execute a job's worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "task_name")]
    pub name: String,
    pub pipeline_id: Uuid,
    pub job_id: Uuid,
    pub worker_class: String,
    pub worker_params: WorkerParams,
    #[serde(default)]
    pub general_settings: GeneralSettings,
    pub attempts: u32,
}

impl Task {
    /// Build the first attempt of a new task with a fresh name
    pub fn new(
        pipeline_id: Uuid,
        job_id: Uuid,
        worker_class: impl Into<String>,
        worker_params: WorkerParams,
        general_settings: GeneralSettings,
    ) -> Self {
        Self {
            name: new_task_name(job_id),
            pipeline_id,
            job_id,
            worker_class: worker_class.into(),
            worker_params,
            general_settings,
            attempts: 1,
        }
    }

    /// The same task, one attempt later
    pub fn next_attempt(&self) -> Task {
        Task {
            attempts: self.attempts + 1,
            ..self.clone()
        }
    }
}

/// Generate a task name that is unique across the job's runs
pub fn new_task_name(job_id: Uuid) -> String {
    format!("{}-{}", job_id.simple(), Uuid::new_v4().simple())
}

/// What the task runner does after an unexpected failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue the task carrying this attempt number
    Retry(u32),
    /// The attempt budget is spent; report the job as failed
    Exhausted,
}

/// Decide whether a task that failed on attempt `attempts` may run again
///
/// A budget of zero is treated as one attempt.
pub fn retry_decision(attempts: u32, max_attempts: u32) -> RetryDecision {
    if attempts < max_attempts.max(1) {
        RetryDecision::Retry(attempts + 1)
    } else {
        RetryDecision::Exhausted
    }
}

/// Completion report for a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_name: String,
    pub job_id: Uuid,
    pub success: bool,
    #[serde(default)]
    pub workers_to_enqueue: Vec<WorkerRequest>,
}

impl TaskResult {
    pub fn succeeded(task: &Task, workers_to_enqueue: Vec<WorkerRequest>) -> Self {
        Self {
            task_name: task.name.clone(),
            job_id: task.job_id,
            success: true,
            workers_to_enqueue,
        }
    }

    pub fn failed(task: &Task) -> Self {
        Self {
            task_name: task.name.clone(),
            job_id: task.job_id,
            success: false,
            workers_to_enqueue: Vec::new(),
        }
    }
}

/// Follow-up work requested by a worker
///
/// Serialized as a `[worker_class, params, delay]` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "(String, WorkerParams, u64)",
    into = "(String, WorkerParams, u64)"
)]
pub struct WorkerRequest {
    pub worker_class: String,
    pub params: WorkerParams,
    /// Seconds to wait before the follow-up task is delivered
    pub delay: u64,
}

impl From<(String, WorkerParams, u64)> for WorkerRequest {
    fn from((worker_class, params, delay): (String, WorkerParams, u64)) -> Self {
        Self {
            worker_class,
            params,
            delay,
        }
    }
}

impl From<WorkerRequest> for (String, WorkerParams, u64) {
    fn from(request: WorkerRequest) -> Self {
        (request.worker_class, request.params, request.delay)
    }
}
