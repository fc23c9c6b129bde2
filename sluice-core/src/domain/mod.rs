//! Core domain types
//!
//! This module contains the core domain structures used across Sluice services.
//! These types represent the fundamental business entities and are shared between
//! the controller (for persistence and dispatch) and the jobs service (for execution).

pub mod job;
pub mod log;
pub mod pipeline;
pub mod setting;
pub mod task;

/// A status string that does not name any known state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);
