//! End-to-end runs of the job and pipeline state machines
//!
//! The jobs service is played by the tests: tasks are taken off the store's
//! in-memory outbox and answered with results fed back into the dispatch
//! service.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use sluice_core::domain::job::{Condition, Job, JobStatus};
use sluice_core::domain::log::LogEntry;
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus};
use sluice_core::domain::setting::GeneralSetting;
use sluice_core::domain::task::{Task, TaskResult, WorkerParams, WorkerRequest};
use sluice_core::dto::message::{StartPipelineMessage, StartPipelines, topics};
use sluice_core::dto::pipeline::{CreateJob, CreatePipeline, CreateStartCondition, PipelineDetails};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::{Result, ServiceError, dispatch_service, pipeline_service};
use crate::store::memory::MemoryStore;
use crate::store::{
    self, Completion, Dispatch, NewJob, NewPipeline, Recorded, RunScope, Store, StoreError,
};

struct Harness {
    store: MemoryStore,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: MemoryStore::new(),
        }
    }

    async fn pipeline(&self, jobs: Vec<CreateJob>) -> PipelineDetails {
        create(&self.store, jobs).await
    }

    async fn scheduled_pipeline(
        &self,
        jobs: Vec<CreateJob>,
        schedules: Vec<&str>,
    ) -> PipelineDetails {
        pipeline_service::create_pipeline(
            &self.store,
            CreatePipeline {
                name: "campaign sync".to_string(),
                run_on_schedule: !schedules.is_empty(),
                schedules: schedules.into_iter().map(String::from).collect(),
                jobs,
            },
        )
        .await
        .unwrap()
    }

    async fn start(&self, id: Uuid) {
        pipeline_service::start(&self.store, id).await.unwrap();
    }

    /// Drain dispatched tasks
    fn tasks(&self) -> Vec<Task> {
        drain_tasks(&self.store)
    }

    async fn try_report(
        &self,
        task: &Task,
        success: bool,
        follow_ups: Vec<WorkerRequest>,
    ) -> Result<()> {
        dispatch_service::task_finished(&self.store, result(task, success, follow_ups)).await
    }

    async fn report(&self, task: &Task, success: bool, follow_ups: Vec<WorkerRequest>) {
        self.try_report(task, success, follow_ups).await.unwrap();
    }

    async fn job(&self, details: &PipelineDetails, name: &str) -> Job {
        job_named(&self.store, details, name).await
    }

    async fn status(&self, details: &PipelineDetails) -> PipelineStatus {
        pipeline_status(&self.store, details).await
    }
}

async fn create(store: &dyn Store, jobs: Vec<CreateJob>) -> PipelineDetails {
    pipeline_service::create_pipeline(
        store,
        CreatePipeline {
            name: "campaign sync".to_string(),
            run_on_schedule: false,
            schedules: vec![],
            jobs,
        },
    )
    .await
    .unwrap()
}

fn drain_tasks(store: &MemoryStore) -> Vec<Task> {
    store
        .outbox()
        .take(topics::TASKS)
        .into_iter()
        .map(|m| serde_json::from_value(m.data).unwrap())
        .collect()
}

fn result(task: &Task, success: bool, follow_ups: Vec<WorkerRequest>) -> TaskResult {
    TaskResult {
        task_name: task.name.clone(),
        job_id: task.job_id,
        success,
        workers_to_enqueue: follow_ups,
    }
}

async fn job_named(store: &dyn Store, details: &PipelineDetails, name: &str) -> Job {
    let id = details
        .jobs
        .iter()
        .find(|j| j.name == name)
        .map(|j| j.id)
        .unwrap();
    store.find_job(id).await.unwrap().unwrap()
}

async fn pipeline_status(store: &dyn Store, details: &PipelineDetails) -> PipelineStatus {
    store
        .find_pipeline(details.pipeline.id)
        .await
        .unwrap()
        .unwrap()
        .status
}

/// A store whose next call to a chosen operation fails
struct FlakyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<&'static str>>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: Mutex::new(HashSet::new()),
        }
    }

    fn fail_once(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    fn check(&self, operation: &'static str) -> store::Result<()> {
        if self.failing.lock().unwrap().remove(operation) {
            return Err(StoreError::Corrupt(format!("{} failed", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn insert_pipeline(&self, pipeline: NewPipeline) -> store::Result<Pipeline> {
        self.inner.insert_pipeline(pipeline).await
    }

    async fn find_pipeline(&self, id: Uuid) -> store::Result<Option<Pipeline>> {
        self.inner.find_pipeline(id).await
    }

    async fn list_pipelines(&self) -> store::Result<Vec<Pipeline>> {
        self.inner.list_pipelines().await
    }

    async fn list_scheduled_pipelines(&self) -> store::Result<Vec<Pipeline>> {
        self.inner.list_scheduled_pipelines().await
    }

    async fn delete_pipeline(&self, id: Uuid) -> store::Result<bool> {
        self.inner.delete_pipeline(id).await
    }

    async fn transition_pipeline(
        &self,
        id: Uuid,
        from: &[PipelineStatus],
        to: PipelineStatus,
    ) -> store::Result<bool> {
        self.check("transition_pipeline")?;
        self.inner.transition_pipeline(id, from, to).await
    }

    async fn insert_job(&self, job: NewJob) -> store::Result<Job> {
        self.inner.insert_job(job).await
    }

    async fn find_job(&self, id: Uuid) -> store::Result<Option<Job>> {
        self.inner.find_job(id).await
    }

    async fn list_jobs(&self, pipeline_id: Uuid) -> store::Result<Vec<Job>> {
        self.inner.list_jobs(pipeline_id).await
    }

    async fn delete_job(&self, id: Uuid) -> store::Result<bool> {
        self.inner.delete_job(id).await
    }

    async fn transition_job(
        &self,
        id: Uuid,
        from: &[JobStatus],
        to: JobStatus,
    ) -> store::Result<bool> {
        self.inner.transition_job(id, from, to).await
    }

    async fn begin_run(&self, pipeline_id: Uuid, scope: RunScope) -> store::Result<bool> {
        self.inner.begin_run(pipeline_id, scope).await
    }

    async fn start_job(&self, job_id: Uuid, first: &Dispatch) -> store::Result<bool> {
        self.inner.start_job(job_id, first).await
    }

    async fn record_result(
        &self,
        job_id: Uuid,
        task_name: &str,
        completion: &Completion,
    ) -> store::Result<Recorded> {
        self.inner.record_result(job_id, task_name, completion).await
    }

    async fn list_settings(&self) -> store::Result<Vec<GeneralSetting>> {
        self.check("list_settings")?;
        self.inner.list_settings().await
    }

    async fn put_setting(&self, name: &str, value: &str) -> store::Result<GeneralSetting> {
        self.inner.put_setting(name, value).await
    }

    async fn add_logs(&self, job_id: Uuid, entries: Vec<LogEntry>) -> store::Result<()> {
        self.inner.add_logs(job_id, entries).await
    }

    async fn job_logs(&self, job_id: Uuid) -> store::Result<Vec<LogEntry>> {
        self.inner.job_logs(job_id).await
    }
}

fn job(name: &str, after: &[(&str, Condition)]) -> CreateJob {
    CreateJob {
        name: name.to_string(),
        worker_class: "Commenter".to_string(),
        params: vec![],
        start_conditions: after
            .iter()
            .map(|(preceding, condition)| CreateStartCondition {
                preceding_job: preceding.to_string(),
                condition: *condition,
            })
            .collect(),
    }
}

fn follow_up(worker_class: &str, delay: u64) -> WorkerRequest {
    let mut params = WorkerParams::new();
    params.insert("comment".to_string(), json!(worker_class));
    WorkerRequest {
        worker_class: worker_class.to_string(),
        params,
        delay,
    }
}

#[tokio::test]
async fn test_success_chain_then_failure_fails_pipeline() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![job("a", &[]), job("b", &[("a", Condition::Success)])])
        .await;

    h.start(p.pipeline.id).await;
    assert_eq!(h.status(&p).await, PipelineStatus::Running);
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Running);
    assert_eq!(h.job(&p, "b").await.status, JobStatus::Waiting);

    let tasks = h.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].job_id, h.job(&p, "a").await.id);

    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(h.job(&p, "b").await.status, JobStatus::Running);

    let tasks = h.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].job_id, h.job(&p, "b").await.id);

    h.report(&tasks[0], false, vec![]).await;
    assert_eq!(h.job(&p, "b").await.status, JobStatus::Failed);
    assert_eq!(h.status(&p).await, PipelineStatus::Failed);
}

#[tokio::test]
async fn test_all_jobs_succeeding_succeeds_pipeline() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![
            job("a", &[]),
            job("b", &[]),
            job("c", &[("a", Condition::Success), ("b", Condition::Whatever)]),
        ])
        .await;

    h.start(p.pipeline.id).await;
    let tasks = h.tasks();
    assert_eq!(tasks.len(), 2);

    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.job(&p, "c").await.status, JobStatus::Waiting);
    h.report(&tasks[1], true, vec![]).await;
    assert_eq!(h.job(&p, "c").await.status, JobStatus::Running);
    assert_eq!(h.status(&p).await, PipelineStatus::Running);

    let tasks = h.tasks();
    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_duplicate_results_are_ignored() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;

    h.start(p.pipeline.id).await;
    let tasks = h.tasks();

    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);

    h.report(&tasks[0], true, vec![follow_up("Commenter", 0)]).await;
    h.report(&tasks[0], false, vec![]).await;

    assert_eq!(h.job(&p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
    assert!(h.tasks().is_empty());
}

#[tokio::test]
async fn test_follow_ups_must_all_finish() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;

    h.start(p.pipeline.id).await;
    let first = h.tasks();

    h.report(
        &first[0],
        true,
        vec![follow_up("Commenter", 0), follow_up("HttpWaiter", 30)],
    )
    .await;

    let a = h.job(&p, "a").await;
    assert_eq!(a.status, JobStatus::Running);
    assert_eq!(a.enqueued_tasks, 2);

    let published = h.store.outbox().take(topics::TASKS);
    assert_eq!(published.len(), 2);
    assert_eq!(published[1].delay, Duration::from_secs(30));
    let follow_ups: Vec<Task> = published
        .into_iter()
        .map(|m| serde_json::from_value(m.data).unwrap())
        .collect();
    assert!(follow_ups.iter().all(|t| t.job_id == a.id && t.attempts == 1));
    assert_eq!(follow_ups[1].worker_class, "HttpWaiter");
    assert_ne!(follow_ups[0].name, follow_ups[1].name);

    // Finish out of order
    h.report(&follow_ups[1], true, vec![]).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Running);

    h.report(&follow_ups[0], true, vec![]).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_failure_with_outstanding_follow_ups_fails_immediately() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;

    h.start(p.pipeline.id).await;
    let first = h.tasks();
    h.report(
        &first[0],
        true,
        vec![follow_up("Commenter", 0), follow_up("Commenter", 0)],
    )
    .await;
    let follow_ups = h.tasks();

    h.report(&follow_ups[0], false, vec![]).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Failed);
    assert_eq!(h.status(&p).await, PipelineStatus::Failed);

    h.report(&follow_ups[1], true, vec![]).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_stop_overrides_success() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;

    h.start(p.pipeline.id).await;
    let tasks = h.tasks();

    let pipeline = pipeline_service::stop(&h.store, p.pipeline.id)
        .await
        .unwrap();
    assert_eq!(pipeline.status, PipelineStatus::Stopping);
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Stopping);

    h.report(&tasks[0], true, vec![follow_up("Commenter", 0)]).await;

    assert_eq!(h.job(&p, "a").await.status, JobStatus::Failed);
    assert_eq!(h.status(&p).await, PipelineStatus::Failed);
    assert!(h.tasks().is_empty());
}

#[tokio::test]
async fn test_stop_fails_jobs_that_never_started() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![job("a", &[]), job("b", &[("a", Condition::Success)])])
        .await;

    h.start(p.pipeline.id).await;
    let tasks = h.tasks();
    pipeline_service::stop(&h.store, p.pipeline.id)
        .await
        .unwrap();

    assert_eq!(h.job(&p, "b").await.status, JobStatus::Failed);
    assert_eq!(h.status(&p).await, PipelineStatus::Stopping);

    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.status(&p).await, PipelineStatus::Failed);
    assert!(h.tasks().is_empty());
}

#[tokio::test]
async fn test_fail_condition_runs_recovery_job() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![
            job("a", &[]),
            job("on_success", &[("a", Condition::Success)]),
            job("on_failure", &[("a", Condition::Fail)]),
            job("after_success", &[("on_success", Condition::Whatever)]),
        ])
        .await;

    h.start(p.pipeline.id).await;
    let tasks = h.tasks();
    h.report(&tasks[0], false, vec![]).await;

    assert_eq!(h.job(&p, "on_success").await.status, JobStatus::Failed);
    assert_eq!(h.job(&p, "on_failure").await.status, JobStatus::Running);
    // A failed predecessor satisfies "whatever"
    assert_eq!(h.job(&p, "after_success").await.status, JobStatus::Running);

    for task in h.tasks() {
        h.report(&task, true, vec![]).await;
    }

    // "a" failed, so the run as a whole failed
    assert_eq!(h.status(&p).await, PipelineStatus::Failed);
}

#[tokio::test]
async fn test_cycle_keeps_waiting_until_stopped() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![
            job("a", &[]),
            job("b", &[("c", Condition::Success)]),
            job("c", &[("b", Condition::Success)]),
        ])
        .await;

    h.start(p.pipeline.id).await;
    let tasks = h.tasks();
    h.report(&tasks[0], true, vec![]).await;

    assert_eq!(h.job(&p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(h.job(&p, "b").await.status, JobStatus::Waiting);
    assert_eq!(h.job(&p, "c").await.status, JobStatus::Waiting);
    assert_eq!(h.status(&p).await, PipelineStatus::Running);

    pipeline_service::stop(&h.store, p.pipeline.id)
        .await
        .unwrap();
    assert_eq!(h.job(&p, "b").await.status, JobStatus::Failed);
    assert_eq!(h.status(&p).await, PipelineStatus::Failed);
}

#[tokio::test]
async fn test_single_job_run_leaves_others_idle() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![job("a", &[]), job("b", &[("a", Condition::Success)])])
        .await;
    let b = h.job(&p, "b").await;

    let started = pipeline_service::start_single_job(&h.store, b.id)
        .await
        .unwrap();
    assert_eq!(started.status, JobStatus::Running);
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Idle);
    assert_eq!(h.status(&p).await, PipelineStatus::Running);

    let tasks = h.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].job_id, b.id);

    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.job(&p, "b").await.status, JobStatus::Succeeded);
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Idle);
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_single_job_run_does_not_start_dependents() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![job("a", &[]), job("b", &[("a", Condition::Success)])])
        .await;
    let a = h.job(&p, "a").await;

    pipeline_service::start_single_job(&h.store, a.id)
        .await
        .unwrap();
    let tasks = h.tasks();
    h.report(&tasks[0], true, vec![]).await;

    assert_eq!(h.job(&p, "b").await.status, JobStatus::Idle);
    assert!(h.tasks().is_empty());
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_finished_pipeline_can_run_again() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;

    h.start(p.pipeline.id).await;
    let tasks = h.tasks();
    h.report(&tasks[0], false, vec![]).await;
    assert_eq!(h.status(&p).await, PipelineStatus::Failed);

    h.start(p.pipeline.id).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Running);

    // A result from the previous run no longer counts
    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Running);

    let tasks = h.tasks();
    h.report(&tasks[0], true, vec![]).await;
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_scheduled_start_matches_reference_time() {
    let h = Harness::new();
    let due = h
        .scheduled_pipeline(vec![job("a", &[])], vec!["7 16 * * *", "* * * * *"])
        .await;
    let not_due = h
        .scheduled_pipeline(vec![job("a", &[])], vec!["8 16 * * *"])
        .await;

    let message = StartPipelineMessage {
        pipelines: StartPipelines::Scheduled,
        scheduled_at: Some(Utc.with_ymd_and_hms(2015, 6, 18, 16, 7, 19).unwrap()),
    };
    let started = dispatch_service::start_pipelines(&h.store, message)
        .await
        .unwrap();

    assert_eq!(started, vec![due.pipeline.id]);
    assert_eq!(h.status(&due).await, PipelineStatus::Running);
    assert_eq!(h.status(&not_due).await, PipelineStatus::Idle);
    // Two matching schedules still start the pipeline once
    assert_eq!(h.tasks().len(), 1);
}

#[tokio::test]
async fn test_explicit_start_skips_unknown_and_running() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;
    let empty = h.pipeline(vec![]).await;

    let message = StartPipelineMessage {
        pipelines: StartPipelines::Ids(vec![
            Uuid::new_v4(),
            p.pipeline.id,
            p.pipeline.id,
            empty.pipeline.id,
        ]),
        scheduled_at: None,
    };
    let started = dispatch_service::start_pipelines(&h.store, message)
        .await
        .unwrap();

    assert_eq!(started, vec![p.pipeline.id]);
    assert_eq!(h.tasks().len(), 1);
}

#[tokio::test]
async fn test_result_for_unknown_job_is_ignored() {
    let h = Harness::new();
    let result = TaskResult {
        task_name: "orphan".to_string(),
        job_id: Uuid::new_v4(),
        success: true,
        workers_to_enqueue: vec![],
    };

    dispatch_service::task_finished(&h.store, result)
        .await
        .unwrap();
    assert!(h.store.outbox().published().is_empty());
}

#[tokio::test]
async fn test_start_interrupted_before_first_task_resumes_on_redelivery() {
    let store = FlakyStore::new();
    let p = create(&store, vec![job("a", &[])]).await;

    store.fail_once("list_settings");
    let err = pipeline_service::start(&store, p.pipeline.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Corrupt(_))));

    // The run began but its first job never went to running
    assert_eq!(pipeline_status(&store, &p).await, PipelineStatus::Running);
    let a = job_named(&store, &p, "a").await;
    assert_eq!(a.status, JobStatus::Waiting);
    assert_eq!(a.enqueued_tasks, 0);
    assert!(drain_tasks(&store.inner).is_empty());

    let message = StartPipelineMessage {
        pipelines: StartPipelines::Ids(vec![p.pipeline.id]),
        scheduled_at: None,
    };
    let started = dispatch_service::start_pipelines(&store, message)
        .await
        .unwrap();
    assert!(started.is_empty());

    let a = job_named(&store, &p, "a").await;
    assert_eq!(a.status, JobStatus::Running);
    assert_eq!(a.enqueued_tasks, 1);
    let tasks = drain_tasks(&store.inner);
    assert_eq!(tasks.len(), 1);

    dispatch_service::task_finished(&store, result(&tasks[0], true, vec![]))
        .await
        .unwrap();
    assert_eq!(pipeline_status(&store, &p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_single_job_run_interrupted_before_first_task_can_be_stopped() {
    let store = FlakyStore::new();
    let p = create(&store, vec![job("a", &[]), job("b", &[])]).await;
    let a = job_named(&store, &p, "a").await;

    store.fail_once("list_settings");
    assert!(pipeline_service::start_single_job(&store, a.id).await.is_err());
    assert_eq!(job_named(&store, &p, "a").await.status, JobStatus::Waiting);

    let pipeline = pipeline_service::stop(&store, p.pipeline.id)
        .await
        .unwrap();
    assert_eq!(pipeline.status, PipelineStatus::Failed);
    assert_eq!(job_named(&store, &p, "a").await.status, JobStatus::Failed);
    assert_eq!(job_named(&store, &p, "b").await.status, JobStatus::Idle);
}

#[tokio::test]
async fn test_start_with_outbox_down_leaves_job_waiting() {
    let h = Harness::new();
    let p = h
        .pipeline(vec![job("a", &[]), job("b", &[("a", Condition::Success)])])
        .await;

    h.store.outbox().set_unavailable(true);
    let err = pipeline_service::start(&h.store, p.pipeline.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Outbox(_))));
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Waiting);
    assert_eq!(h.job(&p, "a").await.enqueued_tasks, 0);

    let pipeline = pipeline_service::stop(&h.store, p.pipeline.id)
        .await
        .unwrap();
    assert_eq!(pipeline.status, PipelineStatus::Failed);
    assert_eq!(h.job(&p, "a").await.status, JobStatus::Failed);
    assert_eq!(h.job(&p, "b").await.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_final_status_written_on_redelivered_result() {
    let store = FlakyStore::new();
    let p = create(&store, vec![job("a", &[])]).await;

    pipeline_service::start(&store, p.pipeline.id).await.unwrap();
    let tasks = drain_tasks(&store.inner);

    // The job finishes but the pipeline's final status is not written
    store.fail_once("transition_pipeline");
    let finished = result(&tasks[0], true, vec![]);
    assert!(dispatch_service::task_finished(&store, finished.clone()).await.is_err());
    assert_eq!(job_named(&store, &p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(pipeline_status(&store, &p).await, PipelineStatus::Running);

    dispatch_service::task_finished(&store, finished)
        .await
        .unwrap();
    assert_eq!(pipeline_status(&store, &p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_follow_ups_are_kept_with_result_when_outbox_down() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;

    h.start(p.pipeline.id).await;
    let first = h.tasks();
    let follow_ups = vec![follow_up("Commenter", 0), follow_up("HttpWaiter", 30)];

    h.store.outbox().set_unavailable(true);
    let err = h
        .try_report(&first[0], true, follow_ups.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Outbox(_))));

    // Nothing was recorded, the original task is still outstanding
    let a = h.job(&p, "a").await;
    assert_eq!(a.status, JobStatus::Running);
    assert_eq!(a.enqueued_tasks, 1);
    assert!(h.tasks().is_empty());

    h.store.outbox().set_unavailable(false);
    h.report(&first[0], true, follow_ups).await;
    assert_eq!(h.job(&p, "a").await.enqueued_tasks, 2);

    let queued = h.tasks();
    assert_eq!(queued.len(), 2);
    h.report(&queued[1], true, vec![]).await;
    h.report(&queued[0], true, vec![]).await;

    assert_eq!(h.job(&p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn test_concurrent_results_settle_once() {
    let h = Harness::new();
    let p = h.pipeline(vec![job("a", &[])]).await;

    h.start(p.pipeline.id).await;
    let first = h.tasks();
    let follow_ups = vec![follow_up("Commenter", 0), follow_up("Commenter", 0)];

    // The same result delivered twice at once queues its follow-ups once
    let (one, two) = tokio::join!(
        h.try_report(&first[0], true, follow_ups.clone()),
        h.try_report(&first[0], true, follow_ups),
    );
    one.unwrap();
    two.unwrap();
    assert_eq!(h.job(&p, "a").await.enqueued_tasks, 2);

    let queued = h.tasks();
    assert_eq!(queued.len(), 2);
    let (one, two) = tokio::join!(
        h.try_report(&queued[0], true, vec![]),
        h.try_report(&queued[1], true, vec![]),
    );
    one.unwrap();
    two.unwrap();

    assert_eq!(h.job(&p, "a").await.status, JobStatus::Succeeded);
    assert_eq!(h.status(&p).await, PipelineStatus::Succeeded);
    assert!(h.tasks().is_empty());
}
