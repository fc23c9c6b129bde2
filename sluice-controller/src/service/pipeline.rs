//! Pipeline Service
//!
//! Pipeline management and the pipeline state machine:
//! `idle -> running -> succeeded | failed`, with `stopping` as an interrupt
//! that always resolves to `failed`.
//!
//! A run ends once every participating job is terminal. Idle jobs do not
//! participate, which is how a single-job run leaves the rest of the pipeline
//! out of the aggregate.

use sluice_core::domain::job::{Job, JobStatus, Readiness, StartCondition};
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus, aggregate_status};
use sluice_core::dto::pipeline::{CreateJob, CreatePipeline, PipelineDetails};
use sluice_core::schedule::CronPattern;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Result, ServiceError, job_service};
use crate::store::{NewJob, NewPipeline, RunScope, Store};

// =============================================================================
// Management
// =============================================================================

/// Create a new pipeline together with its jobs
pub async fn create_pipeline(store: &dyn Store, req: CreatePipeline) -> Result<PipelineDetails> {
    validate_pipeline_request(&req)?;

    let pipeline_id = Uuid::new_v4();
    let jobs = build_jobs(pipeline_id, &req.jobs, &HashMap::new())?;

    let pipeline = store
        .insert_pipeline(NewPipeline {
            id: pipeline_id,
            name: req.name.trim().to_string(),
            run_on_schedule: req.run_on_schedule,
            schedules: req.schedules,
            jobs,
        })
        .await?;

    info!("Pipeline created: {} ({})", pipeline.name, pipeline.id);

    get_pipeline(store, pipeline.id).await
}

/// Get a pipeline with its jobs
pub async fn get_pipeline(store: &dyn Store, id: Uuid) -> Result<PipelineDetails> {
    let pipeline = find(store, id).await?;
    let jobs = store.list_jobs(id).await?;

    Ok(PipelineDetails { pipeline, jobs })
}

/// List all pipelines
pub async fn list_pipelines(store: &dyn Store) -> Result<Vec<Pipeline>> {
    Ok(store.list_pipelines().await?)
}

/// Delete a pipeline that is not running
pub async fn delete_pipeline(store: &dyn Store, id: Uuid) -> Result<()> {
    let pipeline = find(store, id).await?;
    if pipeline.is_blocked() {
        return Err(ServiceError::Blocked(id));
    }

    if !store.delete_pipeline(id).await? {
        return Err(ServiceError::PipelineNotFound(id));
    }

    info!("Pipeline deleted: {}", id);

    Ok(())
}

/// Add a job to a pipeline that is not running
///
/// Start conditions may reference any job already in the pipeline by name.
pub async fn add_job(store: &dyn Store, pipeline_id: Uuid, req: CreateJob) -> Result<Job> {
    let pipeline = find(store, pipeline_id).await?;
    if pipeline.is_blocked() {
        return Err(ServiceError::Blocked(pipeline_id));
    }

    let existing: HashMap<String, Uuid> = store
        .list_jobs(pipeline_id)
        .await?
        .into_iter()
        .map(|job| (job.name, job.id))
        .collect();

    if existing.contains_key(req.name.trim()) {
        return Err(ServiceError::Validation(format!(
            "Job name '{}' is already used in this pipeline",
            req.name.trim()
        )));
    }

    let mut jobs = build_jobs(pipeline_id, std::slice::from_ref(&req), &existing)?;
    let Some(new_job) = jobs.pop() else {
        return Err(ServiceError::Validation("No job given".to_string()));
    };

    let job = store.insert_job(new_job).await?;

    info!("Job {} ({}) added to pipeline {}", job.name, job.id, pipeline_id);

    Ok(job)
}

/// Delete a job whose pipeline is not running
pub async fn delete_job(store: &dyn Store, job_id: Uuid) -> Result<()> {
    let job = job_service::get_job(store, job_id).await?;
    let pipeline = find(store, job.pipeline_id).await?;
    if pipeline.is_blocked() {
        return Err(ServiceError::Blocked(pipeline.id));
    }

    if !store.delete_job(job_id).await? {
        return Err(ServiceError::JobNotFound(job_id));
    }

    info!("Job {} deleted from pipeline {}", job_id, pipeline.id);

    Ok(())
}

// =============================================================================
// State Machine
// =============================================================================

/// Start a full run of a pipeline
///
/// Every job goes back to waiting; jobs whose start conditions are already
/// satisfied (in particular those with none) are started right away.
pub async fn start(store: &dyn Store, id: Uuid) -> Result<Pipeline> {
    let pipeline = find(store, id).await?;
    if pipeline.is_blocked() {
        return Err(ServiceError::Blocked(id));
    }

    let jobs = store.list_jobs(id).await?;
    if jobs.is_empty() {
        return Err(ServiceError::Validation(format!(
            "Pipeline {} has no jobs",
            id
        )));
    }

    if !store.begin_run(id, RunScope::All).await? {
        return Err(ServiceError::Blocked(id));
    }

    info!(
        "Pipeline {} ({}) started with {} job(s)",
        pipeline.name,
        id,
        jobs.len()
    );

    reevaluate(store, id).await?;

    find(store, id).await
}

/// Run one job on its own
///
/// The pipeline still goes to running so structural edits stay blocked. The
/// other jobs are reset to idle and take no part in the run; the target job
/// starts regardless of its start conditions and its dependents are not
/// started when it finishes.
pub async fn start_single_job(store: &dyn Store, job_id: Uuid) -> Result<Job> {
    let job = job_service::get_job(store, job_id).await?;
    let pipeline = find(store, job.pipeline_id).await?;
    if pipeline.is_blocked() {
        return Err(ServiceError::Blocked(pipeline.id));
    }

    if !store
        .begin_run(pipeline.id, RunScope::Single(job_id))
        .await?
    {
        return Err(ServiceError::Blocked(pipeline.id));
    }

    info!(
        "Running job {} ({}) of pipeline {} on its own",
        job.name, job_id, pipeline.id
    );

    let waiting = job_service::get_job(store, job_id).await?;
    job_service::start(store, &waiting).await?;

    reevaluate(store, pipeline.id).await?;

    job_service::get_job(store, job_id).await
}

/// Stop a running pipeline
///
/// Running jobs move to stopping and resolve to failed when their in-flight
/// task reports back. Jobs that never started are failed right away.
/// Stopping a pipeline that is already stopping repeats this sweep.
pub async fn stop(store: &dyn Store, id: Uuid) -> Result<Pipeline> {
    let pipeline = find(store, id).await?;

    let stopping = pipeline.status == PipelineStatus::Stopping
        || store
            .transition_pipeline(id, &[PipelineStatus::Running], PipelineStatus::Stopping)
            .await?;
    if !stopping {
        return Err(ServiceError::InvalidState(format!(
            "Pipeline {} is not running (status: {})",
            id, pipeline.status
        )));
    }

    info!("Pipeline {} ({}) is stopping", pipeline.name, id);

    for job in store.list_jobs(id).await? {
        match job.status {
            JobStatus::Running => {
                job_service::stop(store, &job).await?;
            }
            JobStatus::Waiting => {
                if store
                    .transition_job(job.id, &[JobStatus::Waiting], JobStatus::Failed)
                    .await?
                {
                    debug!("Waiting job {} failed by stop", job.id);
                }
            }
            _ => {}
        }
    }

    reevaluate(store, id).await?;

    find(store, id).await
}

/// Re-evaluate a pipeline after one of its jobs changed state
///
/// While the pipeline is running, waiting jobs whose conditions became
/// satisfied are started and waiting jobs whose conditions can no longer be
/// satisfied are failed, until nothing changes. Then, if every participating
/// job is terminal, the pipeline takes its final status.
pub async fn reevaluate(store: &dyn Store, id: Uuid) -> Result<()> {
    loop {
        let Some(pipeline) = store.find_pipeline(id).await? else {
            warn!("Pipeline {} disappeared during re-evaluation", id);
            return Ok(());
        };
        let jobs = store.list_jobs(id).await?;

        let mut changed = false;
        if pipeline.status == PipelineStatus::Running {
            for job in jobs.iter().filter(|j| j.status == JobStatus::Waiting) {
                match job.readiness(&jobs) {
                    Readiness::Ready => {
                        job_service::start(store, job).await?;
                        changed = true;
                    }
                    Readiness::Unreachable => {
                        if store
                            .transition_job(job.id, &[JobStatus::Waiting], JobStatus::Failed)
                            .await?
                        {
                            info!(
                                "Job {} ({}) can no longer start, marking it failed",
                                job.name, job.id
                            );
                        }
                        changed = true;
                    }
                    Readiness::Waiting => {}
                }
            }
        }

        if changed {
            continue;
        }

        if !pipeline.is_blocked() {
            return Ok(());
        }

        let Some(outcome) = aggregate_status(jobs.iter().map(|j| j.status)) else {
            return Ok(());
        };
        let outcome = if pipeline.status == PipelineStatus::Stopping {
            PipelineStatus::Failed
        } else {
            outcome
        };

        if store
            .transition_pipeline(id, &[pipeline.status], outcome)
            .await?
        {
            info!("Pipeline {} ({}) finished: {}", pipeline.name, id, outcome);
        }

        return Ok(());
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn find(store: &dyn Store, id: Uuid) -> Result<Pipeline> {
    store
        .find_pipeline(id)
        .await?
        .ok_or(ServiceError::PipelineNotFound(id))
}

/// Assign ids to new jobs and resolve their start conditions by name
///
/// `existing` maps the names of jobs already in the pipeline to their ids.
fn build_jobs(
    pipeline_id: Uuid,
    jobs: &[CreateJob],
    existing: &HashMap<String, Uuid>,
) -> Result<Vec<NewJob>> {
    let mut ids = existing.clone();
    for job in jobs {
        ids.insert(job.name.trim().to_string(), Uuid::new_v4());
    }

    jobs.iter()
        .map(|job| -> Result<NewJob> {
            validate_job_request(job)?;

            let name = job.name.trim().to_string();
            let id = ids[&name];

            let mut preceding = HashSet::new();
            let start_conditions = job
                .start_conditions
                .iter()
                .map(|c| -> Result<StartCondition> {
                    let preceding_job_id =
                        ids.get(c.preceding_job.trim()).copied().ok_or_else(|| {
                            ServiceError::Validation(format!(
                                "Job '{}' depends on unknown job '{}'",
                                name, c.preceding_job
                            ))
                        })?;
                    // One condition per preceding job
                    if !preceding.insert(preceding_job_id) {
                        return Err(ServiceError::Validation(format!(
                            "Job '{}' has more than one start condition on job '{}'",
                            name,
                            c.preceding_job.trim()
                        )));
                    }
                    Ok(StartCondition {
                        job_id: id,
                        preceding_job_id,
                        condition: c.condition,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(NewJob {
                id,
                pipeline_id,
                name,
                worker_class: job.worker_class.trim().to_string(),
                params: job.params.clone(),
                start_conditions,
            })
        })
        .collect()
}

// =============================================================================
// Validation
// =============================================================================

fn validate_pipeline_request(req: &CreatePipeline) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Pipeline name cannot be empty".to_string(),
        ));
    }

    if req.name.len() > 255 {
        return Err(ServiceError::Validation(
            "Pipeline name is too long (max 255 characters)".to_string(),
        ));
    }

    for cron in &req.schedules {
        CronPattern::parse(cron)
            .map_err(|e| ServiceError::Validation(format!("Invalid schedule '{}': {}", cron, e)))?;
    }

    let mut names = HashSet::new();
    for job in &req.jobs {
        if !names.insert(job.name.trim()) {
            return Err(ServiceError::Validation(format!(
                "Duplicate job name '{}'",
                job.name.trim()
            )));
        }
    }

    Ok(())
}

fn validate_job_request(job: &CreateJob) -> Result<()> {
    if job.name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Job name cannot be empty".to_string(),
        ));
    }

    if job.name.len() > 255 {
        return Err(ServiceError::Validation(
            "Job name is too long (max 255 characters)".to_string(),
        ));
    }

    if job.worker_class.trim().is_empty() {
        return Err(ServiceError::Validation(format!(
            "Job '{}' has no worker class",
            job.name
        )));
    }

    let mut params = HashSet::new();
    for param in &job.params {
        if param.name.trim().is_empty() {
            return Err(ServiceError::Validation(format!(
                "Job '{}' has a parameter without a name",
                job.name
            )));
        }
        if !params.insert(param.name.as_str()) {
            return Err(ServiceError::Validation(format!(
                "Job '{}' has duplicate parameter '{}'",
                job.name, param.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::domain::job::Condition;
    use sluice_core::dto::pipeline::CreateStartCondition;

    use crate::store::memory::MemoryStore;

    fn job_req(name: &str, after: &[(&str, Condition)]) -> CreateJob {
        CreateJob {
            name: name.to_string(),
            worker_class: "Commenter".to_string(),
            params: vec![],
            start_conditions: after
                .iter()
                .map(|(preceding, condition)| CreateStartCondition {
                    preceding_job: preceding.to_string(),
                    condition: *condition,
                })
                .collect(),
        }
    }

    fn pipeline_req(jobs: Vec<CreateJob>) -> CreatePipeline {
        CreatePipeline {
            name: "Nightly export".to_string(),
            run_on_schedule: false,
            schedules: vec![],
            jobs,
        }
    }

    #[test]
    fn test_validate_empty_name() {
        let mut req = pipeline_req(vec![]);
        req.name = "  ".to_string();

        let result = validate_pipeline_request(&req);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_validate_bad_schedule() {
        let mut req = pipeline_req(vec![]);
        req.schedules = vec!["*/5 * * * *".to_string()];

        let result = validate_pipeline_request(&req);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_validate_duplicate_job_names() {
        let req = pipeline_req(vec![job_req("a", &[]), job_req("a", &[])]);

        let result = validate_pipeline_request(&req);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_validate_missing_worker_class() {
        let mut job = job_req("a", &[]);
        job.worker_class = String::new();

        assert!(matches!(
            validate_job_request(&job),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_build_jobs_resolves_conditions_by_name() {
        let pipeline_id = Uuid::new_v4();
        let jobs = build_jobs(
            pipeline_id,
            &[job_req("a", &[]), job_req("b", &[("a", Condition::Success)])],
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].start_conditions.len(), 1);
        assert_eq!(jobs[1].start_conditions[0].preceding_job_id, jobs[0].id);
        assert_eq!(jobs[1].start_conditions[0].job_id, jobs[1].id);
    }

    #[test]
    fn test_build_jobs_rejects_unknown_reference() {
        let result = build_jobs(
            Uuid::new_v4(),
            &[job_req("b", &[("ghost", Condition::Success)])],
            &HashMap::new(),
        );
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_build_jobs_rejects_two_conditions_on_one_job() {
        let result = build_jobs(
            Uuid::new_v4(),
            &[
                job_req("a", &[]),
                job_req("b", &[("a", Condition::Success), (" a ", Condition::Whatever)]),
            ],
            &HashMap::new(),
        );
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_condition_is_rejected_before_storing() {
        let store = MemoryStore::new();
        let details = create_pipeline(&store, pipeline_req(vec![job_req("a", &[])]))
            .await
            .unwrap();

        let result = add_job(
            &store,
            details.pipeline.id,
            job_req("b", &[("a", Condition::Success), ("a", Condition::Fail)]),
        )
        .await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.list_jobs(details.pipeline.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_and_get_pipeline() {
        let store = MemoryStore::new();
        let details = create_pipeline(
            &store,
            pipeline_req(vec![job_req("a", &[]), job_req("b", &[("a", Condition::Fail)])]),
        )
        .await
        .unwrap();

        assert_eq!(details.pipeline.status, PipelineStatus::Idle);
        assert_eq!(details.jobs.len(), 2);
        assert_eq!(details.jobs[0].name, "a");
        assert!(details.jobs.iter().all(|j| j.status == JobStatus::Idle));
    }

    #[tokio::test]
    async fn test_start_without_jobs_is_rejected() {
        let store = MemoryStore::new();
        let details = create_pipeline(&store, pipeline_req(vec![])).await.unwrap();

        let result = start(&store, details.pipeline.id).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_structural_edits_blocked_while_running() {
        let store = MemoryStore::new();
        let details = create_pipeline(&store, pipeline_req(vec![job_req("a", &[])]))
            .await
            .unwrap();
        let id = details.pipeline.id;

        start(&store, id).await.unwrap();

        let result = add_job(&store, id, job_req("b", &[])).await;
        assert!(matches!(result, Err(ServiceError::Blocked(_))));

        let result = delete_job(&store, details.jobs[0].id).await;
        assert!(matches!(result, Err(ServiceError::Blocked(_))));

        let result = delete_pipeline(&store, id).await;
        assert!(matches!(result, Err(ServiceError::Blocked(_))));

        let result = start(&store, id).await;
        assert!(matches!(result, Err(ServiceError::Blocked(_))));
    }

    #[tokio::test]
    async fn test_add_and_delete_job_while_idle() {
        let store = MemoryStore::new();
        let details = create_pipeline(&store, pipeline_req(vec![job_req("a", &[])]))
            .await
            .unwrap();
        let id = details.pipeline.id;

        let b = add_job(&store, id, job_req("b", &[("a", Condition::Whatever)]))
            .await
            .unwrap();
        assert_eq!(b.start_conditions[0].preceding_job_id, details.jobs[0].id);

        let duplicate = add_job(&store, id, job_req("a", &[])).await;
        assert!(matches!(duplicate, Err(ServiceError::Validation(_))));

        delete_job(&store, details.jobs[0].id).await.unwrap();

        let jobs = store.list_jobs(id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].start_conditions.is_empty());
    }

    #[tokio::test]
    async fn test_stop_can_be_repeated_while_stopping() {
        let store = MemoryStore::new();
        let details = create_pipeline(&store, pipeline_req(vec![job_req("a", &[])]))
            .await
            .unwrap();
        let id = details.pipeline.id;
        start(&store, id).await.unwrap();

        let first = stop(&store, id).await.unwrap();
        assert_eq!(first.status, PipelineStatus::Stopping);

        let again = stop(&store, id).await.unwrap();
        assert_eq!(again.status, PipelineStatus::Stopping);
        let job = store.find_job(details.jobs[0].id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Stopping);
    }

    #[tokio::test]
    async fn test_stop_requires_running_pipeline() {
        let store = MemoryStore::new();
        let details = create_pipeline(&store, pipeline_req(vec![job_req("a", &[])]))
            .await
            .unwrap();

        let result = stop(&store, details.pipeline.id).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }
}
