//! Sluice Core
//!
//! Core types and abstractions for the Sluice pipeline orchestrator.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, Job, Task, etc.) and the
//!   pure predicates that drive their state machines
//! - DTOs: Data transfer objects for inter-service communication
//! - Schedule: the cron-like schedule predicate
//! - Channel: the message channel abstraction shared by controller and jobs

pub mod channel;
pub mod domain;
pub mod dto;
pub mod schedule;
