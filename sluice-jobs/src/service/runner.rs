//! Task runner
//!
//! Executes one task and reports exactly one outcome for it: a result on
//! the `task-finished` topic, or the next attempt of the same task on the
//! `tasks` topic when an unexpected error leaves attempts in the budget.

use std::sync::Arc;
use std::time::Duration;

use sluice_core::channel::{Channel, ChannelError, publish_message};
use sluice_core::domain::task::{RetryDecision, Task, TaskResult, retry_decision};
use sluice_core::dto::message::topics;
use tracing::{debug, info, warn};

use crate::service::LogShipper;
use crate::worker::{self, WorkerContext, WorkerError, WorkerRegistry, params};

/// What happened to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Reported success with this many follow-up requests
    Succeeded(usize),
    /// Reported failure
    Failed,
    /// Re-published as this attempt
    Retried(u32),
}

pub struct TaskRunner {
    registry: Arc<WorkerRegistry>,
    channel: Arc<dyn Channel>,
    logs: Arc<dyn LogShipper>,
    http: reqwest::Client,
}

impl TaskRunner {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        channel: Arc<dyn Channel>,
        logs: Arc<dyn LogShipper>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            registry,
            channel,
            logs,
            http,
        }
    }

    /// Run a task to a single reported outcome
    ///
    /// Only a failure to publish that outcome is an error; the caller should
    /// then have the task delivered again.
    pub async fn run(&self, task: Task) -> Result<TaskOutcome, ChannelError> {
        info!(
            "Running task {} ({} attempt {}) for job {}",
            task.name, task.worker_class, task.attempts, task.job_id
        );

        let mut ctx = WorkerContext::new(&task, self.http.clone());
        let outcome = self.execute(&task, &mut ctx).await;

        self.ship_logs(&task, &ctx).await;

        match outcome {
            Step::Report(result) => {
                let outcome = if result.success {
                    TaskOutcome::Succeeded(result.workers_to_enqueue.len())
                } else {
                    TaskOutcome::Failed
                };
                publish_message(
                    self.channel.as_ref(),
                    topics::TASK_FINISHED,
                    &result,
                    Duration::ZERO,
                )
                .await?;
                debug!("Task {} reported {:?}", task.name, outcome);
                Ok(outcome)
            }
            Step::Retry(next) => {
                let attempt = next.attempts;
                publish_message(self.channel.as_ref(), topics::TASKS, &next, Duration::ZERO)
                    .await?;
                Ok(TaskOutcome::Retried(attempt))
            }
        }
    }

    async fn execute(&self, task: &Task, ctx: &mut WorkerContext) -> Step {
        let spec = match self.registry.resolve(&task.worker_class) {
            Ok(spec) => spec,
            Err(e) => {
                ctx.log_error(format!("Cannot run task: {}", e));
                return Step::Report(TaskResult::failed(task));
            }
        };

        ctx.params = match params::resolve(spec, &task.worker_params, &task.general_settings) {
            Ok(params) => params,
            Err(e) => {
                ctx.log_error(format!("Invalid parameters for {}: {}", spec.name, e));
                return Step::Report(TaskResult::failed(task));
            }
        };

        match worker::execute(spec, ctx).await {
            Ok(requests) => Step::Report(TaskResult::succeeded(task, requests)),
            Err(WorkerError::Failure(message)) => {
                ctx.log_error(format!("{} failed: {}", spec.name, message));
                Step::Report(TaskResult::failed(task))
            }
            Err(WorkerError::Unexpected(e)) => {
                ctx.log_error(format!("{} raised an unexpected error: {:#}", spec.name, e));
                match retry_decision(task.attempts, spec.max_attempts) {
                    RetryDecision::Retry(attempt) => {
                        ctx.log_warning(format!(
                            "Retrying {} (attempt {} of {})",
                            spec.name, attempt, spec.max_attempts
                        ));
                        Step::Retry(task.next_attempt())
                    }
                    RetryDecision::Exhausted => {
                        ctx.log_error(format!(
                            "Giving up on {} after {} attempt(s)",
                            spec.name, task.attempts
                        ));
                        Step::Report(TaskResult::failed(task))
                    }
                }
            }
        }
    }

    async fn ship_logs(&self, task: &Task, ctx: &WorkerContext) {
        let entries = ctx.drain_logs();
        if entries.is_empty() {
            return;
        }

        if let Err(e) = self.logs.ship(task.job_id, entries).await {
            warn!("Failed to ship logs of task {}: {:#}", task.name, e);
        }
    }
}

enum Step {
    Report(TaskResult),
    Retry(Task),
}
