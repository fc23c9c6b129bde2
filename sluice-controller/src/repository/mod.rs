//! Repository Module
//!
//! Data access layer for the controller.
//! Each repository handles database operations for a specific domain entity.

pub mod job;
pub mod log;
pub mod message;
pub mod pipeline;
pub mod setting;
pub mod task;

// Re-export for convenience
pub use job as job_repository;
pub use log as log_repository;
pub use message as message_repository;
pub use pipeline as pipeline_repository;
pub use setting as setting_repository;
pub use task as task_repository;
