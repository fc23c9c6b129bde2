//! Job Service
//!
//! The job state machine: `idle -> waiting -> running -> succeeded | failed`,
//! with `stopping` as a pipeline-initiated interrupt that resolves to
//! `failed` on the next task callback.
//!
//! Task results may arrive more than once and in any order. The store
//! records a result only while its task is outstanding; any other result is
//! ignored.

use sluice_core::domain::job::{Job, JobStatus};
use sluice_core::domain::task::{GeneralSettings, Task, WorkerParams, WorkerRequest};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Result, ServiceError, pipeline_service};
use crate::store::{Completion, Dispatch, Recorded, Store};

/// Get a job by ID
pub async fn get_job(store: &dyn Store, id: Uuid) -> Result<Job> {
    store
        .find_job(id)
        .await?
        .ok_or(ServiceError::JobNotFound(id))
}

/// Whether every start condition of `job` is currently satisfied
pub async fn get_ready(store: &dyn Store, job: &Job) -> Result<bool> {
    let siblings = store.list_jobs(job.pipeline_id).await?;
    Ok(job.get_ready(&siblings))
}

/// Move a waiting job to running and dispatch its first task
///
/// Returns `None` when the job was no longer waiting (another handler got to
/// it first). On error the job is left waiting. The caller is responsible for
/// re-evaluating the pipeline.
pub async fn start(store: &dyn Store, job: &Job) -> Result<Option<Task>> {
    let settings = general_settings(store).await?;
    let first = enqueue(
        job,
        &job.worker_class,
        worker_params(job),
        settings,
        Duration::ZERO,
    );

    if !store.start_job(job.id, &first).await? {
        debug!("Job {} is no longer waiting, not starting it", job.id);
        return Ok(None);
    }

    info!(
        "Job {} ({}) started with task {}",
        job.name, job.id, first.task.name
    );
    Ok(Some(first.task))
}

/// Create a task for `job`
///
/// The task is only dispatched once the store records it together with the
/// state change that asks for it.
pub fn enqueue(
    job: &Job,
    worker_class: &str,
    params: WorkerParams,
    general_settings: GeneralSettings,
    delay: Duration,
) -> Dispatch {
    let task = Task::new(
        job.pipeline_id,
        job.id,
        worker_class,
        params,
        general_settings,
    );

    debug!(
        "Enqueueing task {} ({}) for job {} with delay {:?}",
        task.name, worker_class, job.id, delay
    );

    Dispatch { task, delay }
}

/// Handle a successful task result
///
/// Follow-up workers become new tasks of the same job in the same step that
/// counts off the finished task, so the job only succeeds once every
/// follow-up has reported back too.
pub async fn task_succeeded(
    store: &dyn Store,
    job: &Job,
    task_name: &str,
    follow_ups: Vec<WorkerRequest>,
) -> Result<()> {
    let follow_ups = if job.status == JobStatus::Stopping && !follow_ups.is_empty() {
        info!(
            "Job {} is stopping, dropping {} follow-up task(s)",
            job.id,
            follow_ups.len()
        );
        Vec::new()
    } else {
        follow_ups
    };

    let settings = if follow_ups.is_empty() {
        GeneralSettings::new()
    } else {
        general_settings(store).await?
    };

    let dispatches = follow_ups
        .into_iter()
        .map(|request| {
            enqueue(
                job,
                &request.worker_class,
                request.params,
                settings.clone(),
                Duration::from_secs(request.delay),
            )
        })
        .collect();

    let recorded = store
        .record_result(job.id, task_name, &Completion::Succeeded(dispatches))
        .await?;
    settle(store, job, task_name, recorded).await
}

/// Handle a failed task result
///
/// The job fails immediately, regardless of other outstanding tasks.
pub async fn task_failed(store: &dyn Store, job: &Job, task_name: &str) -> Result<()> {
    let recorded = store
        .record_result(job.id, task_name, &Completion::Failed)
        .await?;
    if recorded != Recorded::Ignored {
        warn!("Task {} of job {} failed", task_name, job.id);
    }
    settle(store, job, task_name, recorded).await
}

/// Ask a running job to stop
///
/// The job resolves to failed on its next task callback.
pub async fn stop(store: &dyn Store, job: &Job) -> Result<bool> {
    let stopped = store
        .transition_job(job.id, &[JobStatus::Running], JobStatus::Stopping)
        .await?;

    if stopped {
        info!("Job {} is stopping", job.id);
    }

    Ok(stopped)
}

/// Follow up on a recorded result
///
/// Re-evaluation is idempotent, so an ignored result still re-evaluates the
/// pipeline: a redelivered result then completes a re-evaluation that failed
/// after its job changed state.
async fn settle(store: &dyn Store, job: &Job, task_name: &str, recorded: Recorded) -> Result<()> {
    match recorded {
        Recorded::Ignored => {
            debug!(
                "Task {} is not outstanding for job {}, ignoring result",
                task_name, job.id
            );
        }
        Recorded::Pending(remaining) => {
            debug!("Job {} still has {} outstanding task(s)", job.id, remaining);
            return Ok(());
        }
        Recorded::Finished(status) => {
            info!("Job {} ({}) finished: {}", job.name, job.id, status);
        }
    }

    pipeline_service::reevaluate(store, job.pipeline_id).await
}

// =============================================================================
// Helper Functions
// =============================================================================

/// The job's params keyed by name
pub fn worker_params(job: &Job) -> WorkerParams {
    job.params
        .iter()
        .map(|p| (p.name.clone(), p.value.clone()))
        .collect()
}

async fn general_settings(store: &dyn Store) -> Result<GeneralSettings> {
    Ok(store
        .list_settings()
        .await?
        .into_iter()
        .map(|s| (s.name, s.value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sluice_core::domain::job::{Param, ParamType};
    use sluice_core::dto::message::topics;

    use crate::store::memory::MemoryStore;
    use crate::store::{NewJob, NewPipeline, StoreError};

    async fn single_job(store: &MemoryStore) -> Job {
        let pipeline_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        store
            .insert_pipeline(NewPipeline {
                id: pipeline_id,
                name: "p".to_string(),
                run_on_schedule: false,
                schedules: vec![],
                jobs: vec![NewJob {
                    id: job_id,
                    pipeline_id,
                    name: "a".to_string(),
                    worker_class: "Commenter".to_string(),
                    params: vec![Param {
                        name: "comment".to_string(),
                        param_type: ParamType::Text,
                        value: json!("hello"),
                    }],
                    start_conditions: vec![],
                }],
            })
            .await
            .unwrap();
        store.find_job(job_id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_start_requires_waiting() {
        let store = MemoryStore::new();
        let job = single_job(&store).await;

        let task = start(&store, &job).await.unwrap();
        assert!(task.is_none());
        assert!(store.outbox().published().is_empty());
    }

    #[tokio::test]
    async fn test_start_dispatches_first_task() {
        let store = MemoryStore::new();
        store
            .put_setting("api_token", "secret")
            .await
            .unwrap();
        let job = single_job(&store).await;
        store.set_job_status(job.id, JobStatus::Waiting).await;

        let task = start(&store, &job).await.unwrap().unwrap();

        assert_eq!(task.attempts, 1);
        assert_eq!(task.worker_params["comment"], json!("hello"));
        assert_eq!(task.general_settings["api_token"], "secret");

        let job = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.enqueued_tasks, 1);

        let published = store.outbox().take(topics::TASKS);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].data["task_name"], json!(task.name));
    }

    #[tokio::test]
    async fn test_start_leaves_job_waiting_when_task_cannot_be_queued() {
        let store = MemoryStore::new();
        store.outbox().set_unavailable(true);
        let job = single_job(&store).await;
        store.set_job_status(job.id, JobStatus::Waiting).await;

        let result = start(&store, &job).await;

        assert!(matches!(
            result,
            Err(ServiceError::Store(StoreError::Outbox(_)))
        ));
        let job = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.enqueued_tasks, 0);

        store.outbox().set_unavailable(false);
        assert!(start(&store, &job).await.unwrap().is_some());
        let job = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.enqueued_tasks, 1);
    }

    #[tokio::test]
    async fn test_result_for_idle_job_is_ignored() {
        let store = MemoryStore::new();
        let job = single_job(&store).await;

        task_succeeded(&store, &job, "unknown", vec![]).await.unwrap();
        task_failed(&store, &job, "unknown").await.unwrap();

        let job = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Idle);
    }

    #[tokio::test]
    async fn test_unknown_task_name_is_ignored() {
        let store = MemoryStore::new();
        let job = single_job(&store).await;
        store.set_job_status(job.id, JobStatus::Waiting).await;
        start(&store, &job).await.unwrap();
        let job = store.find_job(job.id).await.unwrap().unwrap();

        task_failed(&store, &job, "not-a-task").await.unwrap();

        let job = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.enqueued_tasks, 1);
    }

    #[tokio::test]
    async fn test_stop_only_applies_to_running_jobs() {
        let store = MemoryStore::new();
        let job = single_job(&store).await;

        assert!(!stop(&store, &job).await.unwrap());

        store.set_job_status(job.id, JobStatus::Running).await;
        assert!(stop(&store, &job).await.unwrap());

        let job = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Stopping);
    }
}
