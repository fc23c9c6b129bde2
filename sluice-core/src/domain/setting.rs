//! General setting domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide configuration value available to workers that declare it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSetting {
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
