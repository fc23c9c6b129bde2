//! Job Repository
//!
//! Handles all database operations related to jobs and their start conditions.

use chrono::{DateTime, Utc};
use sluice_core::domain::job::{Condition, Job, JobStatus, Param, StartCondition};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::store::{NewJob, StoreError};

const JOB_COLUMNS: &str = r#"
    j.id, j.pipeline_id, j.name, j.status, j.worker_class, j.params,
    (SELECT COUNT(*) FROM enqueued_tasks t WHERE t.job_id = j.id) AS enqueued_tasks,
    j.created_at, j.updated_at
"#;

/// Create a job and its start conditions in one transaction
pub async fn create(pool: &PgPool, new: NewJob) -> Result<Job, StoreError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    insert_job_row(&mut *tx, &new, now).await?;
    insert_conditions(&mut *tx, &new).await?;

    tx.commit().await?;

    Ok(Job {
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
    })
}

/// Insert the job row itself
pub async fn insert_job_row(
    conn: &mut PgConnection,
    job: &NewJob,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO jobs (id, pipeline_id, name, status, worker_class, params, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        "#,
    )
    .bind(job.id)
    .bind(job.pipeline_id)
    .bind(&job.name)
    .bind(JobStatus::Idle.as_str())
    .bind(&job.worker_class)
    .bind(Json(&job.params))
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert the start conditions of a job
pub async fn insert_conditions(conn: &mut PgConnection, job: &NewJob) -> Result<(), sqlx::Error> {
    for condition in &job.start_conditions {
        sqlx::query(
            r#"
            INSERT INTO start_conditions (job_id, preceding_job_id, condition)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(job.id)
        .bind(condition.preceding_job_id)
        .bind(condition.condition.as_str())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Job>, StoreError> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs j WHERE j.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let condition_rows = sqlx::query_as::<_, ConditionRow>(
        r#"
        SELECT job_id, preceding_job_id, condition
        FROM start_conditions
        WHERE job_id = $1
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let conditions = condition_rows
        .into_iter()
        .map(ConditionRow::into_condition)
        .collect::<Result<Vec<_>, _>>()?;

    row.into_job(conditions).map(Some)
}

/// Find jobs by pipeline ID, in creation order
pub async fn find_by_pipeline(pool: &PgPool, pipeline_id: Uuid) -> Result<Vec<Job>, StoreError> {
    let rows = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs j WHERE j.pipeline_id = $1 ORDER BY j.seq ASC"
    ))
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    let condition_rows = sqlx::query_as::<_, ConditionRow>(
        r#"
        SELECT c.job_id, c.preceding_job_id, c.condition
        FROM start_conditions c
        JOIN jobs j ON j.id = c.job_id
        WHERE j.pipeline_id = $1
        "#,
    )
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    let mut conditions: HashMap<Uuid, Vec<StartCondition>> = HashMap::new();
    for row in condition_rows {
        let condition = row.into_condition()?;
        conditions.entry(condition.job_id).or_default().push(condition);
    }

    rows.into_iter()
        .map(|row| {
            let own = conditions.remove(&row.id).unwrap_or_default();
            row.into_job(own)
        })
        .collect()
}

/// Compare-and-set the job status
pub async fn transition(
    conn: &mut PgConnection,
    id: Uuid,
    from: &[JobStatus],
    to: JobStatus,
) -> Result<bool, sqlx::Error> {
    let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();

    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = $1, updated_at = NOW()
        WHERE id = $2 AND status = ANY($3)
        "#,
    )
    .bind(to.as_str())
    .bind(id)
    .bind(&from)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Lock a job row for the rest of the transaction and read its status
pub async fn lock_status(conn: &mut PgConnection, id: Uuid) -> Result<Option<JobStatus>, StoreError> {
    let status: Option<(String,)> = sqlx::query_as("SELECT status FROM jobs WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    status
        .map(|(status,)| {
            status
                .parse::<JobStatus>()
                .map_err(|e| StoreError::Corrupt(format!("job {}: {}", id, e)))
        })
        .transpose()
}

/// Reset the jobs of a pipeline for a new run
///
/// With `only` set, that job goes to waiting and every other job to idle;
/// otherwise every job goes to waiting.
pub async fn reset_for_run(
    conn: &mut PgConnection,
    pipeline_id: Uuid,
    only: Option<Uuid>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = CASE WHEN $2::uuid IS NULL OR id = $2 THEN $3 ELSE $4 END,
            updated_at = NOW()
        WHERE pipeline_id = $1
        "#,
    )
    .bind(pipeline_id)
    .bind(only)
    .bind(JobStatus::Waiting.as_str())
    .bind(JobStatus::Idle.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete a job by ID; conditions on either side of it cascade
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    pipeline_id: Uuid,
    name: String,
    status: String,
    worker_class: String,
    params: Json<Vec<Param>>,
    enqueued_tasks: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self, start_conditions: Vec<StartCondition>) -> Result<Job, StoreError> {
        let status = self
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Corrupt(format!("job {}: {}", self.id, e)))?;

        Ok(Job {
            id: self.id,
            pipeline_id: self.pipeline_id,
            name: self.name,
            status,
            worker_class: self.worker_class,
            params: self.params.0,
            start_conditions,
            enqueued_tasks: self.enqueued_tasks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ConditionRow {
    job_id: Uuid,
    preceding_job_id: Uuid,
    condition: String,
}

impl ConditionRow {
    fn into_condition(self) -> Result<StartCondition, StoreError> {
        let condition = self.condition.parse::<Condition>().map_err(|e| {
            StoreError::Corrupt(format!("start condition of job {}: {}", self.job_id, e))
        })?;

        Ok(StartCondition {
            job_id: self.job_id,
            preceding_job_id: self.preceding_job_id,
            condition,
        })
    }
}
