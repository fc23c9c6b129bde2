//! Dispatch Service
//!
//! Entry points for the messages the controller consumes from the channel:
//! start-pipeline requests and task results. Both tolerate duplicate
//! delivery.

use chrono::Utc;
use sluice_core::domain::task::TaskResult;
use sluice_core::dto::message::{StartPipelineMessage, StartPipelines};
use sluice_core::schedule;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Result, ServiceError, job_service, pipeline_service};
use crate::store::Store;

/// Handle a start-pipeline message
///
/// For the scheduled selector every schedule-enabled pipeline is checked
/// against the reference time and started on its first matching schedule.
/// Explicit ids that do not resolve are skipped, as are pipelines that are
/// already running. Returns the ids of the pipelines that were started.
pub async fn start_pipelines(store: &dyn Store, message: StartPipelineMessage) -> Result<Vec<Uuid>> {
    let mut started = Vec::new();

    match message.pipelines {
        StartPipelines::Scheduled => {
            let at = message.scheduled_at.unwrap_or_else(Utc::now);
            debug!("Checking scheduled pipelines at {}", at);

            for pipeline in store.list_scheduled_pipelines().await? {
                for schedule in &pipeline.schedules {
                    match schedule::is_due(&schedule.cron, at) {
                        Ok(true) => {
                            info!(
                                "Pipeline {} ({}) is due on schedule '{}'",
                                pipeline.name, pipeline.id, schedule.cron
                            );
                            if try_start(store, pipeline.id).await? {
                                started.push(pipeline.id);
                            }
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(
                                "Skipping invalid schedule '{}' of pipeline {}: {}",
                                schedule.cron, pipeline.id, e
                            );
                        }
                    }
                }
            }
        }
        StartPipelines::Ids(ids) => {
            for id in ids {
                if try_start(store, id).await? {
                    started.push(id);
                }
            }
        }
    }

    Ok(started)
}

/// Handle a task result
///
/// Results for jobs that no longer exist are ignored.
pub async fn task_finished(store: &dyn Store, result: TaskResult) -> Result<()> {
    let Some(job) = store.find_job(result.job_id).await? else {
        warn!(
            "Result of task {} refers to unknown job {}, ignoring",
            result.task_name, result.job_id
        );
        return Ok(());
    };

    debug!(
        "Task {} of job {} finished (success: {}, follow-ups: {})",
        result.task_name,
        job.id,
        result.success,
        result.workers_to_enqueue.len()
    );

    if result.success {
        job_service::task_succeeded(
            store,
            &job,
            &result.task_name,
            result.workers_to_enqueue,
        )
        .await
    } else {
        job_service::task_failed(store, &job, &result.task_name).await
    }
}

/// Start a pipeline, treating "cannot start" outcomes as skips
///
/// A pipeline that is already running is re-evaluated instead, which picks
/// up a run whose start failed after the pipeline went to running.
async fn try_start(store: &dyn Store, id: Uuid) -> Result<bool> {
    match pipeline_service::start(store, id).await {
        Ok(_) => Ok(true),
        Err(ServiceError::PipelineNotFound(_)) => {
            warn!("Pipeline {} not found, skipping", id);
            Ok(false)
        }
        Err(ServiceError::Blocked(_)) => {
            info!("Pipeline {} is already running, skipping", id);
            pipeline_service::reevaluate(store, id).await?;
            Ok(false)
        }
        Err(ServiceError::Validation(msg)) => {
            warn!("Pipeline {} cannot start: {}", id, msg);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
