//! Service layer
//!
//! Task execution and the log plumbing around it.

mod log_buffer;
mod log_shipper;
mod runner;

pub use log_buffer::{InMemoryLogBuffer, LogBufferService};
pub use log_shipper::LogShipper;
pub use runner::{TaskOutcome, TaskRunner};
