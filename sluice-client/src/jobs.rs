//! Job-related API endpoints

use crate::ControllerClient;
use crate::error::Result;
use sluice_core::domain::job::Job;
use sluice_core::domain::log::LogEntry;
use sluice_core::dto::log::LogBatch;
use uuid::Uuid;

impl ControllerClient {
    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let url = self.url(&format!("/api/job/{}", job_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Delete a job from its pipeline
    pub async fn delete_job(&self, job_id: Uuid) -> Result<()> {
        let url = self.url(&format!("/api/job/{}", job_id));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Run a single job without its dependents
    pub async fn run_job(&self, job_id: Uuid) -> Result<Job> {
        let url = self.url(&format!("/api/job/{}/run", job_id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Logs
    // =============================================================================

    /// Get the logs of a job
    pub async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<LogEntry>> {
        let url = self.url(&format!("/api/job/{}/logs", job_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Append log entries to a job
    pub async fn send_logs(&self, job_id: Uuid, entries: Vec<LogEntry>) -> Result<()> {
        let url = self.url(&format!("/api/job/{}/logs", job_id));
        let response = self
            .client
            .post(&url)
            .json(&LogBatch { entries })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
