//! Channel Message Repository
//!
//! Durable storage behind the message channel. A message row lives until its
//! subscriber accepts it or rejects it permanently.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use std::time::Duration;

/// Store a message for delivery no earlier than `start_time`
pub async fn insert(
    conn: &mut PgConnection,
    topic: &str,
    data: &Value,
    start_time: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO channel_messages (topic, data, start_time, deliver_at)
        VALUES ($1, $2, $3, $3)
        RETURNING id
        "#,
    )
    .bind(topic)
    .bind(data)
    .bind(start_time)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Claim up to `limit` due messages
///
/// Claimed messages are leased by pushing their delivery time `lease` into the
/// future, so a relay that dies mid-delivery does not lose them.
pub async fn claim_due(
    pool: &PgPool,
    limit: i64,
    lease: Duration,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    sqlx::query_as::<_, MessageRow>(
        r#"
        UPDATE channel_messages m
        SET deliver_at = NOW() + make_interval(secs => $2)
        WHERE m.id IN (
            SELECT id FROM channel_messages
            WHERE deliver_at <= NOW()
            ORDER BY deliver_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING m.id, m.topic, m.data, m.start_time, m.attempts
        "#,
    )
    .bind(limit)
    .bind(lease.as_secs_f64())
    .fetch_all(pool)
    .await
}

/// Remove a delivered or dropped message
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM channel_messages WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Schedule another delivery attempt
pub async fn reschedule(
    pool: &PgPool,
    id: i64,
    deliver_at: DateTime<Utc>,
    count_attempt: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE channel_messages
        SET deliver_at = $1, attempts = attempts + CASE WHEN $2 THEN 1 ELSE 0 END
        WHERE id = $3
        "#,
    )
    .bind(deliver_at)
    .bind(count_attempt)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub topic: String,
    pub data: Value,
    pub start_time: DateTime<Utc>,
    pub attempts: i32,
}
