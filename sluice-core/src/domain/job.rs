//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownStatus;

/// One schedulable unit within a pipeline, bound to exactly one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    pub status: JobStatus,
    pub worker_class: String,
    pub params: Vec<Param>,
    pub start_conditions: Vec<StartCondition>,
    /// Number of tasks dispatched for this job that have not reported back
    pub enqueued_tasks: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Evaluate this job's start conditions against its siblings
    pub fn readiness(&self, siblings: &[Job]) -> Readiness {
        readiness(&self.start_conditions, |id| {
            siblings.iter().find(|job| job.id == id).map(|job| job.status)
        })
    }

    /// Whether every start condition is currently satisfied
    pub fn get_ready(&self, siblings: &[Job]) -> bool {
        self.readiness(siblings) == Readiness::Ready
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Waiting,
    Running,
    Succeeded,
    Failed,
    Stopping,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Stopping => "stopping",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(JobStatus::Idle),
            "waiting" => Ok(JobStatus::Waiting),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "stopping" => Ok(JobStatus::Stopping),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A typed key/value pair merged into the worker's input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub value: serde_json::Value,
}

/// Type tag of a worker parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Text,
    Number,
    Boolean,
    StringList,
    NumberList,
    Sql,
}

/// Dependency edge gating a job on a preceding job's terminal status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCondition {
    pub job_id: Uuid,
    pub preceding_job_id: Uuid,
    pub condition: Condition,
}

/// What a start condition requires of its preceding job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Success,
    Fail,
    Whatever,
}

/// Outcome of evaluating a single condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionState {
    Satisfied,
    /// The preceding job has not finished yet
    Pending,
    /// The preceding job finished the wrong way; this can never become true
    Unsatisfiable,
}

impl Condition {
    pub fn evaluate(self, preceding: JobStatus) -> ConditionState {
        match (self, preceding) {
            (Condition::Success, JobStatus::Succeeded) => ConditionState::Satisfied,
            (Condition::Success, JobStatus::Failed) => ConditionState::Unsatisfiable,
            (Condition::Fail, JobStatus::Failed) => ConditionState::Satisfied,
            (Condition::Fail, JobStatus::Succeeded) => ConditionState::Unsatisfiable,
            (Condition::Whatever, status) if status.is_terminal() => ConditionState::Satisfied,
            _ => ConditionState::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Success => "success",
            Condition::Fail => "fail",
            Condition::Whatever => "whatever",
        }
    }
}

impl FromStr for Condition {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Condition::Success),
            "fail" => Ok(Condition::Fail),
            "whatever" => Ok(Condition::Whatever),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Eligibility of a job given its start conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every condition is satisfied
    Ready,
    /// At least one preceding job has not finished
    Waiting,
    /// At least one condition can never be satisfied in this run
    Unreachable,
}

/// Evaluate a set of start conditions
///
/// `status_of` looks up the current status of a preceding job. A condition
/// that references a job which no longer exists is unsatisfiable. An empty
/// condition set is always ready.
pub fn readiness<F>(conditions: &[StartCondition], status_of: F) -> Readiness
where
    F: Fn(Uuid) -> Option<JobStatus>,
{
    let mut result = Readiness::Ready;

    for condition in conditions {
        let state = match status_of(condition.preceding_job_id) {
            Some(status) => condition.condition.evaluate(status),
            None => ConditionState::Unsatisfiable,
        };

        match state {
            ConditionState::Satisfied => {}
            ConditionState::Pending => result = Readiness::Waiting,
            ConditionState::Unsatisfiable => return Readiness::Unreachable,
        }
    }

    result
}
