//! Log DTOs for inter-service communication

use serde::{Deserialize, Serialize};

use crate::domain::log::LogEntry;

/// Log batch shipped from the jobs service to the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatch {
    pub entries: Vec<LogEntry>,
}
