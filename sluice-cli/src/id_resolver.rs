//! ID resolver module
//!
//! Lets users type a short, unambiguous prefix instead of a full UUID.

use anyhow::{Context, Result, anyhow};
use sluice_client::ControllerClient;
use uuid::Uuid;

/// Pick the one id starting with `input`
///
/// A full UUID is returned as-is without looking at the candidates.
pub fn match_prefix(
    kind: &str,
    input: &str,
    candidates: impl IntoIterator<Item = Uuid>,
) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let prefix = input.to_lowercase();
    let matches: Vec<Uuid> = candidates
        .into_iter()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No {} found with ID starting with '{}'", kind, prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple {}s: {}",
                prefix,
                kind,
                ids.join(", ")
            ))
        }
    }
}

/// Resolve a pipeline ID or prefix to a full UUID
pub async fn resolve_pipeline_id(client: &ControllerClient, input: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let pipelines = client
        .list_pipelines()
        .await
        .context("Failed to fetch pipelines for ID resolution")?;

    match_prefix("pipeline", input, pipelines.iter().map(|p| p.id))
}

/// Resolve a job ID or prefix to a full UUID
///
/// Jobs are only listed per pipeline, so a prefix costs one request per
/// pipeline.
pub async fn resolve_job_id(client: &ControllerClient, input: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let pipelines = client
        .list_pipelines()
        .await
        .context("Failed to fetch pipelines for ID resolution")?;

    let mut job_ids = Vec::new();
    for pipeline in pipelines {
        let details = client
            .get_pipeline(pipeline.id)
            .await
            .with_context(|| format!("Failed to fetch jobs of pipeline {}", pipeline.id))?;
        job_ids.extend(details.jobs.iter().map(|j| j.id));
    }

    match_prefix("job", input, job_ids)
}
