//! Log Repository
//!
//! Handles all database operations related to job logs.

use sluice_core::domain::log::{LogEntry, LogLevel};
use sqlx::PgPool;
use uuid::Uuid;

/// Add log entries for a job
pub async fn add_entries(
    pool: &PgPool,
    job_id: Uuid,
    entries: Vec<LogEntry>,
) -> Result<(), sqlx::Error> {
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO job_logs (job_id, task_name, timestamp, level, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job_id)
        .bind(&entry.task_name)
        .bind(entry.timestamp)
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Get all log entries for a job
pub async fn find_by_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<LogEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT task_name, timestamp, level, message
        FROM job_logs
        WHERE job_id = $1
        ORDER BY timestamp ASC, id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct LogRow {
    task_name: Option<String>,
    timestamp: chrono::DateTime<chrono::Utc>,
    level: String,
    message: String,
}

impl From<LogRow> for LogEntry {
    fn from(row: LogRow) -> Self {
        LogEntry {
            timestamp: row.timestamp,
            level: LogLevel::from_str_lossy(&row.level),
            message: row.message,
            task_name: row.task_name,
        }
    }
}
