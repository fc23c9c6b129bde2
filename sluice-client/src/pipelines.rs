//! Pipeline-related API endpoints

use crate::ControllerClient;
use crate::error::Result;
use sluice_core::domain::job::Job;
use sluice_core::domain::pipeline::Pipeline;
use sluice_core::dto::pipeline::{CreateJob, CreatePipeline, PipelineDetails};
use uuid::Uuid;

impl ControllerClient {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// Create a pipeline together with its jobs
    pub async fn create_pipeline(&self, req: &CreatePipeline) -> Result<PipelineDetails> {
        let url = self.url("/api/pipeline/create");
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// List all pipelines
    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        let url = self.url("/api/pipeline/list");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get a pipeline with its jobs
    pub async fn get_pipeline(&self, id: Uuid) -> Result<PipelineDetails> {
        let url = self.url(&format!("/api/pipeline/{}", id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Delete a pipeline
    pub async fn delete_pipeline(&self, id: Uuid) -> Result<()> {
        let url = self.url(&format!("/api/pipeline/{}", id));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Add a job to a pipeline
    pub async fn add_job(&self, pipeline_id: Uuid, req: &CreateJob) -> Result<Job> {
        let url = self.url(&format!("/api/pipeline/{}/jobs", pipeline_id));
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Pipeline Execution
    // =============================================================================

    /// Start a pipeline
    pub async fn start_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        let url = self.url(&format!("/api/pipeline/{}/start", id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Ask a running pipeline to stop
    pub async fn stop_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        let url = self.url(&format!("/api/pipeline/{}/stop", id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }
}
