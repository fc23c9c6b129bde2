//! General Setting Repository

use chrono::{DateTime, Utc};
use sluice_core::domain::setting::GeneralSetting;
use sqlx::PgPool;

/// List every general setting by name
pub async fn list_all(pool: &PgPool) -> Result<Vec<GeneralSetting>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SettingRow>(
        r#"
        SELECT name, value, updated_at
        FROM general_settings
        ORDER BY name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Create or replace a general setting
pub async fn upsert(pool: &PgPool, name: &str, value: &str) -> Result<GeneralSetting, sqlx::Error> {
    let row = sqlx::query_as::<_, SettingRow>(
        r#"
        INSERT INTO general_settings (name, value, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (name) DO UPDATE
        SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
        RETURNING name, value, updated_at
        "#,
    )
    .bind(name)
    .bind(value)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

#[derive(sqlx::FromRow)]
struct SettingRow {
    name: String,
    value: String,
    updated_at: DateTime<Utc>,
}

impl From<SettingRow> for GeneralSetting {
    fn from(row: SettingRow) -> Self {
        GeneralSetting {
            name: row.name,
            value: row.value,
            updated_at: row.updated_at,
        }
    }
}
