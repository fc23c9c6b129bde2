//! Store Module
//!
//! Persistence boundary for the controller. Services talk to a [`Store`]
//! rather than to the database directly so the state machines can be driven
//! against an in-memory store in tests.
//!
//! Status changes are compare-and-set: a transition only applies when the
//! current status is one of the expected ones, so a transition happens at
//! most once across concurrent handlers.
//!
//! Tasks are queued on the channel by the store itself, in the same
//! transaction as the status change and outstanding-task bookkeeping that
//! go with them. A running job therefore always has its outstanding tasks
//! queued or in flight.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use sluice_core::domain::job::{Job, JobStatus, Param, StartCondition};
use sluice_core::domain::log::LogEntry;
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus};
use sluice_core::domain::setting::GeneralSetting;
use sluice_core::domain::task::Task;
use std::time::Duration;
use uuid::Uuid;

pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("failed to queue task: {0}")]
    Outbox(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A pipeline to insert together with its jobs
#[derive(Debug, Clone)]
pub struct NewPipeline {
    pub id: Uuid,
    pub name: String,
    pub run_on_schedule: bool,
    pub schedules: Vec<String>,
    pub jobs: Vec<NewJob>,
}

/// A job to insert
///
/// Ids are assigned by the caller so start conditions can reference jobs
/// inserted in the same batch.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    pub worker_class: String,
    pub params: Vec<Param>,
    pub start_conditions: Vec<StartCondition>,
}

/// A task to queue on the tasks topic
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub task: Task,
    pub delay: Duration,
}

/// Which jobs take part in a new pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
    All,
    /// Only this job runs; the others stay idle
    Single(Uuid),
}

/// How a task ended
#[derive(Debug, Clone)]
pub enum Completion {
    /// The task succeeded and asked for these follow-up tasks
    Succeeded(Vec<Dispatch>),
    Failed,
}

/// What recording a task result did to its job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// The task was not outstanding for a running job; nothing changed
    Ignored,
    /// The job still waits on this many tasks
    Pending(i64),
    /// The job reached this terminal status
    Finished(JobStatus),
}

#[async_trait]
pub trait Store: Send + Sync {
    // Pipelines

    /// Insert a pipeline, its schedules and its jobs atomically
    async fn insert_pipeline(&self, pipeline: NewPipeline) -> Result<Pipeline>;

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>>;

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>>;

    /// Pipelines with `run_on_schedule` set
    async fn list_scheduled_pipelines(&self) -> Result<Vec<Pipeline>>;

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool>;

    /// Set the status to `to` if it is currently one of `from`
    async fn transition_pipeline(
        &self,
        id: Uuid,
        from: &[PipelineStatus],
        to: PipelineStatus,
    ) -> Result<bool>;

    // Jobs

    async fn insert_job(&self, job: NewJob) -> Result<Job>;

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>>;

    /// Jobs of a pipeline in creation order
    async fn list_jobs(&self, pipeline_id: Uuid) -> Result<Vec<Job>>;

    /// Delete a job along with every start condition that references it
    async fn delete_job(&self, id: Uuid) -> Result<bool>;

    /// Set the status to `to` if it is currently one of `from`
    async fn transition_job(&self, id: Uuid, from: &[JobStatus], to: JobStatus) -> Result<bool>;

    // Runs

    /// Put an idle or finished pipeline into running and reset its jobs
    ///
    /// Jobs in `scope` go to waiting, the others to idle, and every
    /// outstanding task is forgotten. Returns `false`, changing nothing, when
    /// the pipeline is running or stopping.
    async fn begin_run(&self, pipeline_id: Uuid, scope: RunScope) -> Result<bool>;

    /// Move a waiting job to running and queue its first task
    ///
    /// The task becomes the job's only outstanding task. Returns `false`,
    /// changing nothing, when the job is not waiting.
    async fn start_job(&self, job_id: Uuid, first: &Dispatch) -> Result<bool>;

    /// Record the result of an outstanding task
    ///
    /// A failure fails the job. A success queues its follow-ups as new
    /// outstanding tasks and succeeds the job once none are left. A job that
    /// is stopping fails on any result and its follow-ups are dropped.
    async fn record_result(
        &self,
        job_id: Uuid,
        task_name: &str,
        completion: &Completion,
    ) -> Result<Recorded>;

    // General settings

    async fn list_settings(&self) -> Result<Vec<GeneralSetting>>;

    async fn put_setting(&self, name: &str, value: &str) -> Result<GeneralSetting>;

    // Job logs

    async fn add_logs(&self, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()>;

    async fn job_logs(&self, job_id: Uuid) -> Result<Vec<LogEntry>>;
}
