//! Log shipping
//!
//! Sends the entries of a finished worker run to the controller.

use async_trait::async_trait;
use sluice_client::ControllerClient;
use sluice_core::domain::log::LogEntry;
use uuid::Uuid;

#[async_trait]
pub trait LogShipper: Send + Sync {
    async fn ship(&self, job_id: Uuid, entries: Vec<LogEntry>) -> anyhow::Result<()>;
}

#[async_trait]
impl LogShipper for ControllerClient {
    async fn ship(&self, job_id: Uuid, entries: Vec<LogEntry>) -> anyhow::Result<()> {
        self.send_logs(job_id, entries).await?;
        Ok(())
    }
}
