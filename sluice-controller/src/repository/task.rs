//! Task Repository
//!
//! Bookkeeping of the tasks each job has dispatched but not yet heard back
//! from. The outstanding-task counter of a job is the row count here.
//!
//! Every function runs on a connection so callers can combine them with the
//! job status change in one transaction.

use sqlx::PgConnection;
use uuid::Uuid;

/// Register a dispatched task for a job
pub async fn add(conn: &mut PgConnection, job_id: Uuid, task_name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO enqueued_tasks (job_id, task_name)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(job_id)
    .bind(task_name)
    .execute(conn)
    .await?;

    Ok(())
}

/// Remove a finished task; `false` when it was not outstanding
pub async fn remove(conn: &mut PgConnection, job_id: Uuid, task_name: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM enqueued_tasks WHERE job_id = $1 AND task_name = $2")
        .bind(job_id)
        .bind(task_name)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Forget every outstanding task of a job
pub async fn clear(conn: &mut PgConnection, job_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM enqueued_tasks WHERE job_id = $1")
        .bind(job_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Forget every outstanding task of every job in a pipeline
pub async fn clear_pipeline(conn: &mut PgConnection, pipeline_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM enqueued_tasks
        WHERE job_id IN (SELECT id FROM jobs WHERE pipeline_id = $1)
        "#,
    )
    .bind(pipeline_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Count outstanding tasks of a job
pub async fn count(conn: &mut PgConnection, job_id: Uuid) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM enqueued_tasks WHERE job_id = $1")
        .bind(job_id)
        .fetch_one(conn)
        .await?;

    Ok(row.0)
}
