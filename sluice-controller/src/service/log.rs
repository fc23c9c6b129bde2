//! Log Service
//!
//! Business logic for job log management.

use sluice_core::domain::log::LogEntry;
use uuid::Uuid;

use super::{Result, ServiceError, job_service};
use crate::store::Store;

/// Add log entries for a job
pub async fn add_log_entries(store: &dyn Store, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()> {
    // Validate entries
    validate_log_entries(&entries)?;

    if entries.is_empty() {
        return Ok(());
    }

    // Make sure the job exists
    job_service::get_job(store, job_id).await?;

    let count = entries.len();
    store.add_logs(job_id, entries).await?;

    tracing::debug!("Added {} log entries for job: {}", count, job_id);

    Ok(())
}

/// Get all log entries for a job
pub async fn get_job_logs(store: &dyn Store, job_id: Uuid) -> Result<Vec<LogEntry>> {
    job_service::get_job(store, job_id).await?;

    Ok(store.job_logs(job_id).await?)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_log_entries(entries: &[LogEntry]) -> Result<()> {
    const MAX_MESSAGE_LENGTH: usize = 10_000;
    const MAX_BATCH_SIZE: usize = 1000;

    if entries.len() > MAX_BATCH_SIZE {
        return Err(ServiceError::Validation(format!(
            "Too many log entries in batch (max: {})",
            MAX_BATCH_SIZE
        )));
    }

    for (i, entry) in entries.iter().enumerate() {
        if entry.message.len() > MAX_MESSAGE_LENGTH {
            return Err(ServiceError::Validation(format!(
                "Log entry {} message too long (max: {} chars)",
                i, MAX_MESSAGE_LENGTH
            )));
        }
    }

    Ok(())
}
