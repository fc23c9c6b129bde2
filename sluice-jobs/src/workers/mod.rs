//! Built-in workers

mod checkpoint;
mod commenter;
mod http_request;
mod http_waiter;

pub use checkpoint::Checkpoint;
pub use commenter::Commenter;
pub use http_request::HttpRequest;
pub use http_waiter::HttpWaiter;

use crate::worker::WorkerRegistry;

/// Registry holding every built-in worker
pub fn builtin_registry() -> WorkerRegistry {
    WorkerRegistry::new()
        .with(Commenter::spec())
        .with(Checkpoint::spec())
        .with(HttpRequest::spec())
        .with(HttpWaiter::spec())
}
