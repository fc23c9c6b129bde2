//! Scheduler trigger
//!
//! Asks the controller, through the channel, to start every pipeline whose
//! schedule matches the current minute.

pub mod ticker;

pub use ticker::ScheduleTicker;
