//! Service Module
//!
//! Business logic layer for the controller.
//! Services drive the job and pipeline state machines over a [`Store`],
//! which also queues the tasks those state changes dispatch.
//!
//! [`Store`]: crate::store::Store

pub mod dispatch;
pub mod job;
pub mod log;
pub mod pipeline;
pub mod settings;

#[cfg(test)]
mod scenarios;

use uuid::Uuid;

use crate::store::StoreError;

// Re-export for convenience
pub use dispatch as dispatch_service;
pub use job as job_service;
pub use log as log_service;
pub use pipeline as pipeline_service;
pub use settings as settings_service;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Pipeline {0} not found")]
    PipelineNotFound(Uuid),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Pipeline {0} is running or stopping")]
    Blocked(Uuid),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
