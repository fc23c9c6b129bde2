//! Durable message channel
//!
//! `PgChannel` stores published messages in Postgres and `MessageRelay`
//! pushes them to the subscriber of their topic.

pub mod channel;
pub mod delivery;

pub use channel::PgChannel;
pub use delivery::MessageRelay;
