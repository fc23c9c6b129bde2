//! Pipeline Repository
//!
//! Handles all database operations related to pipelines and their schedules.

use sluice_core::domain::pipeline::{Pipeline, PipelineStatus, Schedule};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::repository::job_repository;
use crate::store::{NewPipeline, StoreError};

/// Create a pipeline with its schedules and jobs in one transaction
pub async fn create(pool: &PgPool, new: NewPipeline) -> Result<Pipeline, StoreError> {
    let now = chrono::Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO pipelines (id, name, status, run_on_schedule, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(new.id)
    .bind(&new.name)
    .bind(PipelineStatus::Idle.as_str())
    .bind(new.run_on_schedule)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let mut schedules = Vec::with_capacity(new.schedules.len());
    for (position, cron) in new.schedules.iter().enumerate() {
        let schedule = Schedule {
            id: Uuid::new_v4(),
            cron: cron.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO schedules (id, pipeline_id, cron, position)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(schedule.id)
        .bind(new.id)
        .bind(&schedule.cron)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;

        schedules.push(schedule);
    }

    // Conditions reference jobs of the same batch, so every job goes in first
    for job in &new.jobs {
        job_repository::insert_job_row(&mut *tx, job, now).await?;
    }
    for job in &new.jobs {
        job_repository::insert_conditions(&mut *tx, job).await?;
    }

    tx.commit().await?;

    Ok(Pipeline {
        id: new.id,
        name: new.name,
        status: PipelineStatus::Idle,
        run_on_schedule: new.run_on_schedule,
        schedules,
        created_at: now,
        updated_at: now,
    })
}

/// Find a pipeline by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, name, status, run_on_schedule, created_at, updated_at
        FROM pipelines
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(with_schedules(pool, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// List all pipelines
pub async fn list_all(pool: &PgPool) -> Result<Vec<Pipeline>, StoreError> {
    let rows = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, name, status, run_on_schedule, created_at, updated_at
        FROM pipelines
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    with_schedules(pool, rows).await
}

/// List pipelines that run on schedule
pub async fn list_scheduled(pool: &PgPool) -> Result<Vec<Pipeline>, StoreError> {
    let rows = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, name, status, run_on_schedule, created_at, updated_at
        FROM pipelines
        WHERE run_on_schedule
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    with_schedules(pool, rows).await
}

/// Delete a pipeline
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Compare-and-set the pipeline status
pub async fn transition(
    conn: &mut PgConnection,
    id: Uuid,
    from: &[PipelineStatus],
    to: PipelineStatus,
) -> Result<bool, sqlx::Error> {
    let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();

    let result = sqlx::query(
        r#"
        UPDATE pipelines
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

// =============================================================================
// Helper Functions
// =============================================================================

async fn with_schedules(
    pool: &PgPool,
    rows: Vec<PipelineRow>,
) -> Result<Vec<Pipeline>, StoreError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let schedule_rows = sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT id, pipeline_id, cron
        FROM schedules
        WHERE pipeline_id = ANY($1)
        ORDER BY position ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut schedules: HashMap<Uuid, Vec<Schedule>> = HashMap::new();
    for row in schedule_rows {
        schedules.entry(row.pipeline_id).or_default().push(Schedule {
            id: row.id,
            cron: row.cron,
        });
    }

    rows.into_iter()
        .map(|row| {
            let schedules = schedules.remove(&row.id).unwrap_or_default();
            row.into_pipeline(schedules)
        })
        .collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    name: String,
    status: String,
    run_on_schedule: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineRow {
    fn into_pipeline(self, schedules: Vec<Schedule>) -> Result<Pipeline, StoreError> {
        let status = self
            .status
            .parse::<PipelineStatus>()
            .map_err(|e| StoreError::Corrupt(format!("pipeline {}: {}", self.id, e)))?;

        Ok(Pipeline {
            id: self.id,
            name: self.name,
            status,
            run_on_schedule: self.run_on_schedule,
            schedules,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    pipeline_id: Uuid,
    cron: String,
}
