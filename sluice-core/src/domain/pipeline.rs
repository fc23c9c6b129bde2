//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownStatus;
use crate::domain::job::JobStatus;

/// Pipeline definition
///
/// A named collection of jobs with an aggregate run status. The status is
/// only ever changed by the pipeline state machine in the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub name: String,
    pub status: PipelineStatus,
    pub run_on_schedule: bool,
    pub schedules: Vec<Schedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Whether structural edits are currently forbidden
    pub fn is_blocked(&self) -> bool {
        self.status.is_blocked()
    }
}

/// A cron string attached to a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub id: Uuid,
    pub cron: String,
}

/// Pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
    Stopping,
}

impl PipelineStatus {
    /// Statuses from which a new run may begin
    pub const STARTABLE: [PipelineStatus; 3] = [
        PipelineStatus::Idle,
        PipelineStatus::Succeeded,
        PipelineStatus::Failed,
    ];

    /// A running or stopping pipeline may not be edited or restarted
    pub fn is_blocked(self) -> bool {
        matches!(self, PipelineStatus::Running | PipelineStatus::Stopping)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::Running => "running",
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Stopping => "stopping",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(PipelineStatus::Idle),
            "running" => Ok(PipelineStatus::Running),
            "succeeded" => Ok(PipelineStatus::Succeeded),
            "failed" => Ok(PipelineStatus::Failed),
            "stopping" => Ok(PipelineStatus::Stopping),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Compute the terminal status of a run from the statuses of its jobs
///
/// Idle jobs did not take part in the run and are ignored. Returns `None`
/// while any participating job is still waiting, running or stopping, or
/// when nothing participated at all. Otherwise the run succeeded only if
/// every participating job succeeded.
pub fn aggregate_status<I>(statuses: I) -> Option<PipelineStatus>
where
    I: IntoIterator<Item = JobStatus>,
{
    let mut participated = false;
    let mut all_succeeded = true;

    for status in statuses {
        match status {
            JobStatus::Idle => continue,
            JobStatus::Succeeded => participated = true,
            JobStatus::Failed => {
                participated = true;
                all_succeeded = false;
            }
            JobStatus::Waiting | JobStatus::Running | JobStatus::Stopping => return None,
        }
    }

    if !participated {
        return None;
    }

    Some(if all_succeeded {
        PipelineStatus::Succeeded
    } else {
        PipelineStatus::Failed
    })
}
