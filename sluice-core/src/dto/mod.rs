//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used between Sluice services (controller, jobs
//! service, CLI) and the push envelopes carried by the message channel.

pub mod log;
pub mod message;
pub mod pipeline;
pub mod setting;
