//! Pipeline DTOs for inter-service communication

use serde::{Deserialize, Serialize};

use crate::domain::job::{Condition, Job, Param};
use crate::domain::pipeline::Pipeline;

/// Request to create a new pipeline together with its jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub name: String,
    #[serde(default)]
    pub run_on_schedule: bool,
    /// Cron strings
    #[serde(default)]
    pub schedules: Vec<String>,
    #[serde(default)]
    pub jobs: Vec<CreateJob>,
}

/// A job definition inside a create or add-job request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub name: String,
    pub worker_class: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub start_conditions: Vec<CreateStartCondition>,
}

/// A start condition referencing its preceding job by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStartCondition {
    pub preceding_job: String,
    pub condition: Condition,
}

/// A pipeline together with its jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDetails {
    #[serde(flatten)]
    pub pipeline: Pipeline,
    pub jobs: Vec<Job>,
}
