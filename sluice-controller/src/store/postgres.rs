//! Postgres-backed store

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sluice_core::domain::job::{Job, JobStatus};
use sluice_core::domain::log::LogEntry;
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus};
use sluice_core::domain::setting::GeneralSetting;
use sluice_core::dto::message::topics;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    Completion, Dispatch, NewJob, NewPipeline, Recorded, Result, RunScope, Store, StoreError,
};
use crate::repository::{
    job_repository, log_repository, message_repository, pipeline_repository, setting_repository,
    task_repository,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_pipeline(&self, pipeline: NewPipeline) -> Result<Pipeline> {
        pipeline_repository::create(&self.pool, pipeline).await
    }

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>> {
        pipeline_repository::find_by_id(&self.pool, id).await
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        pipeline_repository::list_all(&self.pool).await
    }

    async fn list_scheduled_pipelines(&self) -> Result<Vec<Pipeline>> {
        pipeline_repository::list_scheduled(&self.pool).await
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool> {
        Ok(pipeline_repository::delete(&self.pool, id).await?)
    }

    async fn transition_pipeline(
        &self,
        id: Uuid,
        from: &[PipelineStatus],
        to: PipelineStatus,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(pipeline_repository::transition(&mut *conn, id, from, to).await?)
    }

    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        job_repository::create(&self.pool, job).await
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>> {
        job_repository::find_by_id(&self.pool, id).await
    }

    async fn list_jobs(&self, pipeline_id: Uuid) -> Result<Vec<Job>> {
        job_repository::find_by_pipeline(&self.pool, pipeline_id).await
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        Ok(job_repository::delete(&self.pool, id).await?)
    }

    async fn transition_job(&self, id: Uuid, from: &[JobStatus], to: JobStatus) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(job_repository::transition(&mut *conn, id, from, to).await?)
    }

    async fn begin_run(&self, pipeline_id: Uuid, scope: RunScope) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !pipeline_repository::transition(
            &mut *tx,
            pipeline_id,
            &PipelineStatus::STARTABLE,
            PipelineStatus::Running,
        )
        .await?
        {
            tx.rollback().await?;
            return Ok(false);
        }

        let only = match scope {
            RunScope::All => None,
            RunScope::Single(job_id) => Some(job_id),
        };
        task_repository::clear_pipeline(&mut *tx, pipeline_id).await?;
        job_repository::reset_for_run(&mut *tx, pipeline_id, only).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn start_job(&self, job_id: Uuid, first: &Dispatch) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !job_repository::transition(&mut *tx, job_id, &[JobStatus::Waiting], JobStatus::Running)
            .await?
        {
            tx.rollback().await?;
            return Ok(false);
        }

        task_repository::clear(&mut *tx, job_id).await?;
        task_repository::add(&mut *tx, job_id, &first.task.name).await?;
        queue(&mut *tx, first).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn record_result(
        &self,
        job_id: Uuid,
        task_name: &str,
        completion: &Completion,
    ) -> Result<Recorded> {
        let mut tx = self.pool.begin().await?;

        let status = job_repository::lock_status(&mut *tx, job_id).await?;
        let Some(status @ (JobStatus::Running | JobStatus::Stopping)) = status else {
            tx.rollback().await?;
            return Ok(Recorded::Ignored);
        };

        if !task_repository::remove(&mut *tx, job_id, task_name).await? {
            tx.rollback().await?;
            return Ok(Recorded::Ignored);
        }

        let recorded = match completion {
            Completion::Succeeded(follow_ups) if status == JobStatus::Running => {
                for dispatch in follow_ups {
                    task_repository::add(&mut *tx, job_id, &dispatch.task.name).await?;
                    queue(&mut *tx, dispatch).await?;
                }

                let remaining = task_repository::count(&mut *tx, job_id).await?;
                if remaining > 0 {
                    Recorded::Pending(remaining)
                } else {
                    job_repository::transition(&mut *tx, job_id, &[status], JobStatus::Succeeded)
                        .await?;
                    Recorded::Finished(JobStatus::Succeeded)
                }
            }
            _ => {
                task_repository::clear(&mut *tx, job_id).await?;
                job_repository::transition(&mut *tx, job_id, &[status], JobStatus::Failed).await?;
                Recorded::Finished(JobStatus::Failed)
            }
        };

        tx.commit().await?;
        Ok(recorded)
    }

    async fn list_settings(&self) -> Result<Vec<GeneralSetting>> {
        Ok(setting_repository::list_all(&self.pool).await?)
    }

    async fn put_setting(&self, name: &str, value: &str) -> Result<GeneralSetting> {
        Ok(setting_repository::upsert(&self.pool, name, value).await?)
    }

    async fn add_logs(&self, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()> {
        Ok(log_repository::add_entries(&self.pool, job_id, entries).await?)
    }

    async fn job_logs(&self, job_id: Uuid) -> Result<Vec<LogEntry>> {
        Ok(log_repository::find_by_job(&self.pool, job_id).await?)
    }
}

/// Store a task message for the relay to deliver
async fn queue(conn: &mut PgConnection, dispatch: &Dispatch) -> Result<()> {
    let data =
        serde_json::to_value(&dispatch.task).map_err(|e| StoreError::Outbox(e.to_string()))?;
    let delay = TimeDelta::from_std(dispatch.delay).map_err(|e| StoreError::Outbox(e.to_string()))?;

    let id = message_repository::insert(conn, topics::TASKS, &data, Utc::now() + delay).await?;
    tracing::debug!("Queued task {} as message {}", dispatch.task.name, id);

    Ok(())
}
