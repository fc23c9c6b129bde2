//! General setting DTOs

use serde::{Deserialize, Serialize};

/// Request body for creating or replacing a general setting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutSetting {
    pub value: String,
}
