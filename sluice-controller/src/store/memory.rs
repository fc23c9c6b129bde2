//! In-memory store used by the service tests
//!
//! Queued tasks are published to an in-memory channel, before any state is
//! changed, so a disabled channel leaves the store untouched.

use async_trait::async_trait;
use chrono::Utc;
use sluice_core::channel::{MemoryChannel, publish_message};
use sluice_core::domain::job::{Job, JobStatus};
use sluice_core::domain::log::LogEntry;
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus, Schedule};
use sluice_core::domain::setting::GeneralSetting;
use sluice_core::dto::message::topics;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Completion, Dispatch, NewJob, NewPipeline, Recorded, Result, RunScope, Store, StoreError,
};

#[derive(Debug, Default)]
struct State {
    pipelines: HashMap<Uuid, Pipeline>,
    /// Insertion order doubles as creation order
    jobs: Vec<Job>,
    tasks: HashMap<Uuid, BTreeSet<String>>,
    settings: BTreeMap<String, GeneralSetting>,
    logs: HashMap<Uuid, Vec<LogEntry>>,
}

impl State {
    fn job_with_count(&self, job: &Job) -> Job {
        let mut job = job.clone();
        job.enqueued_tasks = self.tasks.get(&job.id).map_or(0, |t| t.len() as i64);
        job
    }

    fn insert_job(&mut self, new: NewJob) -> Job {
        let now = Utc::now();
        let job = Job {
            id: new.id,
            pipeline_id: new.pipeline_id,
            name: new.name,
            status: JobStatus::Idle,
            worker_class: new.worker_class,
            params: new.params,
            start_conditions: new.start_conditions,
            enqueued_tasks: 0,
            created_at: now,
            updated_at: now,
        };
        self.jobs.push(job.clone());
        job
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    outbox: Arc<MemoryChannel>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel queued tasks are published to
    pub fn outbox(&self) -> &MemoryChannel {
        &self.outbox
    }

    async fn queue(&self, dispatches: &[Dispatch]) -> Result<()> {
        for dispatch in dispatches {
            publish_message(
                &*self.outbox,
                topics::TASKS,
                &dispatch.task,
                dispatch.delay,
            )
            .await
            .map_err(|e| StoreError::Outbox(e.to_string()))?;
        }
        Ok(())
    }

    /// Force a job into a status, bypassing the state machine
    pub async fn set_job_status(&self, id: Uuid, status: JobStatus) {
        let mut state = self.state.write().await;
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = status;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_pipeline(&self, new: NewPipeline) -> Result<Pipeline> {
        let now = Utc::now();
        let pipeline = Pipeline {
            id: new.id,
            name: new.name,
            status: PipelineStatus::Idle,
            run_on_schedule: new.run_on_schedule,
            schedules: new
                .schedules
                .into_iter()
                .map(|cron| Schedule {
                    id: Uuid::new_v4(),
                    cron,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state.pipelines.insert(pipeline.id, pipeline.clone());
        for job in new.jobs {
            state.insert_job(job);
        }
        Ok(pipeline)
    }

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>> {
        Ok(self.state.read().await.pipelines.get(&id).cloned())
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        Ok(self.state.read().await.pipelines.values().cloned().collect())
    }

    async fn list_scheduled_pipelines(&self) -> Result<Vec<Pipeline>> {
        let state = self.state.read().await;
        let mut pipelines: Vec<Pipeline> = state
            .pipelines
            .values()
            .filter(|p| p.run_on_schedule)
            .cloned()
            .collect();
        pipelines.sort_by_key(|p| p.created_at);
        Ok(pipelines)
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.pipelines.remove(&id).is_some();
        state.jobs.retain(|j| j.pipeline_id != id);
        Ok(removed)
    }

    async fn transition_pipeline(
        &self,
        id: Uuid,
        from: &[PipelineStatus],
        to: PipelineStatus,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.pipelines.get_mut(&id) {
            Some(pipeline) if from.contains(&pipeline.status) => {
                pipeline.status = to;
                pipeline.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        Ok(self.state.write().await.insert_job(job))
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .iter()
            .find(|j| j.id == id)
            .map(|j| state.job_with_count(j)))
    }

    async fn list_jobs(&self, pipeline_id: Uuid) -> Result<Vec<Job>> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.pipeline_id == pipeline_id)
            .map(|j| state.job_with_count(j))
            .collect())
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.jobs.len();
        state.jobs.retain(|j| j.id != id);
        for job in state.jobs.iter_mut() {
            job.start_conditions.retain(|c| c.preceding_job_id != id);
        }
        state.tasks.remove(&id);
        Ok(state.jobs.len() < before)
    }

    async fn transition_job(&self, id: Uuid, from: &[JobStatus], to: JobStatus) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if from.contains(&job.status) => {
                job.status = to;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn begin_run(&self, pipeline_id: Uuid, scope: RunScope) -> Result<bool> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        match state.pipelines.get_mut(&pipeline_id) {
            Some(pipeline) if PipelineStatus::STARTABLE.contains(&pipeline.status) => {
                pipeline.status = PipelineStatus::Running;
                pipeline.updated_at = now;
            }
            _ => return Ok(false),
        }

        for job in state.jobs.iter_mut().filter(|j| j.pipeline_id == pipeline_id) {
            state.tasks.remove(&job.id);
            job.status = match scope {
                RunScope::Single(id) if id != job.id => JobStatus::Idle,
                _ => JobStatus::Waiting,
            };
            job.updated_at = now;
        }
        Ok(true)
    }

    async fn start_job(&self, job_id: Uuid, first: &Dispatch) -> Result<bool> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(job) = state.jobs.iter_mut().find(|j| j.id == job_id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Waiting {
            return Ok(false);
        }

        self.queue(std::slice::from_ref(first)).await?;

        job.status = JobStatus::Running;
        job.updated_at = Utc::now();
        state
            .tasks
            .insert(job_id, BTreeSet::from([first.task.name.clone()]));
        Ok(true)
    }

    async fn record_result(
        &self,
        job_id: Uuid,
        task_name: &str,
        completion: &Completion,
    ) -> Result<Recorded> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(job) = state.jobs.iter_mut().find(|j| j.id == job_id) else {
            return Ok(Recorded::Ignored);
        };
        if !matches!(job.status, JobStatus::Running | JobStatus::Stopping) {
            return Ok(Recorded::Ignored);
        }
        let outstanding = state.tasks.entry(job_id).or_default();
        if !outstanding.contains(task_name) {
            return Ok(Recorded::Ignored);
        }

        let status = match completion {
            Completion::Succeeded(follow_ups) if job.status == JobStatus::Running => {
                self.queue(follow_ups).await?;
                outstanding.remove(task_name);
                outstanding.extend(follow_ups.iter().map(|d| d.task.name.clone()));
                if !outstanding.is_empty() {
                    return Ok(Recorded::Pending(outstanding.len() as i64));
                }
                JobStatus::Succeeded
            }
            _ => {
                outstanding.clear();
                JobStatus::Failed
            }
        };

        job.status = status;
        job.updated_at = Utc::now();
        Ok(Recorded::Finished(status))
    }

    async fn list_settings(&self) -> Result<Vec<GeneralSetting>> {
        Ok(self.state.read().await.settings.values().cloned().collect())
    }

    async fn put_setting(&self, name: &str, value: &str) -> Result<GeneralSetting> {
        let setting = GeneralSetting {
            name: name.to_string(),
            value: value.to_string(),
            updated_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .settings
            .insert(setting.name.clone(), setting.clone());
        Ok(setting)
    }

    async fn add_logs(&self, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()> {
        self.state
            .write()
            .await
            .logs
            .entry(job_id)
            .or_default()
            .extend(entries);
        Ok(())
    }

    async fn job_logs(&self, job_id: Uuid) -> Result<Vec<LogEntry>> {
        Ok(self
            .state
            .read()
            .await
            .logs
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }
}
