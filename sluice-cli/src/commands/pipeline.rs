//! Pipeline command handlers
//!
//! Creation from a JSON definition, listing, inspection, execution control
//! and deletion.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use sluice_core::domain::pipeline::Pipeline;
use sluice_core::dto::pipeline::{CreateJob, CreatePipeline, PipelineDetails};
use std::collections::HashMap;
use uuid::Uuid;

use super::{colorize_job_status, colorize_pipeline_status};
use crate::config::Config;
use crate::id_resolver::resolve_pipeline_id;
use sluice_client::ControllerClient;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create a pipeline from a JSON definition
    Create {
        /// Path to the JSON file
        #[arg(short, long)]
        file: String,
    },
    /// List all pipelines
    List,
    /// Get pipeline details with its jobs
    Get {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Start a pipeline
    Start {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Stop a running pipeline
    Stop {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Add a job from a JSON definition
    AddJob {
        /// Pipeline ID or unambiguous prefix
        id: String,

        /// Path to the JSON file
        #[arg(short, long)]
        file: String,
    },
    /// Delete a pipeline
    Delete {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = ControllerClient::new(&config.controller_url);

    match command {
        PipelineCommands::Create { file } => create_pipeline(&client, &file).await,
        PipelineCommands::List => list_pipelines(&client).await,
        PipelineCommands::Get { id } => get_pipeline(&client, &id).await,
        PipelineCommands::Start { id } => start_pipeline(&client, &id).await,
        PipelineCommands::Stop { id } => stop_pipeline(&client, &id).await,
        PipelineCommands::AddJob { id, file } => add_job(&client, &id, &file).await,
        PipelineCommands::Delete { id } => delete_pipeline(&client, &id).await,
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition file: {}", path))?;

    serde_json::from_str(&content).with_context(|| format!("Invalid definition in {}", path))
}

/// Create a new pipeline from a JSON definition
async fn create_pipeline(client: &ControllerClient, path: &str) -> Result<()> {
    let req: CreatePipeline = read_json(path)?;

    let details = client.create_pipeline(&req).await?;

    println!("{}", "✓ Pipeline created successfully!".green().bold());
    println!("  ID:   {}", details.pipeline.id.to_string().cyan());
    println!("  Name: {}", details.pipeline.name.bold());
    println!(
        "  Jobs: {}",
        details
            .jobs
            .iter()
            .map(|j| j.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
            .dimmed()
    );

    Ok(())
}

/// List all pipelines
async fn list_pipelines(client: &ControllerClient) -> Result<()> {
    let pipelines = client.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} pipeline(s):", pipelines.len()).bold()
        );
        println!();
        for pipeline in pipelines {
            print_pipeline_summary(&pipeline);
        }
    }

    Ok(())
}

/// Get and display a single pipeline
async fn get_pipeline(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, id).await?;

    let details = client.get_pipeline(uuid).await?;

    print_pipeline_details(&details);

    Ok(())
}

async fn start_pipeline(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, id).await?;

    let pipeline = client.start_pipeline(uuid).await?;

    println!("{}", "✓ Pipeline started!".green().bold());
    println!("  Status: {}", colorize_pipeline_status(pipeline.status));

    Ok(())
}

async fn stop_pipeline(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, id).await?;

    let pipeline = client.stop_pipeline(uuid).await?;

    println!("{}", "✓ Stop requested".green().bold());
    println!("  Status: {}", colorize_pipeline_status(pipeline.status));

    Ok(())
}

async fn add_job(client: &ControllerClient, id: &str, path: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, id).await?;
    let req: CreateJob = read_json(path)?;

    let job = client.add_job(uuid, &req).await?;

    println!("{}", "✓ Job added!".green().bold());
    println!("  ID:     {}", job.id.to_string().cyan());
    println!("  Name:   {}", job.name.bold());
    println!("  Worker: {}", job.worker_class);

    Ok(())
}

/// Delete a pipeline
async fn delete_pipeline(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, id).await?;

    client.delete_pipeline(uuid).await?;

    println!(
        "{}",
        format!("✓ Pipeline {} deleted successfully!", uuid)
            .green()
            .bold()
    );

    Ok(())
}

/// Print a pipeline summary
fn print_pipeline_summary(pipeline: &Pipeline) {
    println!("  {} {}", "▸".cyan(), pipeline.name.bold());
    println!("    ID:      {}", pipeline.id.to_string().dimmed());
    println!("    Status:  {}", colorize_pipeline_status(pipeline.status));
    if pipeline.run_on_schedule {
        let crons: Vec<&str> = pipeline.schedules.iter().map(|s| s.cron.as_str()).collect();
        println!("    Runs on: {}", crons.join(" | ").dimmed());
    }
    println!();
}

/// Print detailed pipeline information
fn print_pipeline_details(details: &PipelineDetails) {
    let pipeline = &details.pipeline;

    println!("{}", "Pipeline Details:".bold());
    println!("  ID:        {}", pipeline.id.to_string().cyan());
    println!("  Name:      {}", pipeline.name.bold());
    println!("  Status:    {}", colorize_pipeline_status(pipeline.status));
    println!(
        "  Scheduled: {}",
        if pipeline.run_on_schedule { "yes" } else { "no" }
    );
    for schedule in &pipeline.schedules {
        println!("    - {}", schedule.cron);
    }
    println!(
        "  Updated:   {}",
        pipeline.updated_at.format("%Y-%m-%d %H:%M:%S")
    );

    let names: HashMap<Uuid, &str> = details
        .jobs
        .iter()
        .map(|j| (j.id, j.name.as_str()))
        .collect();

    println!("\n{}", "Jobs:".bold());
    if details.jobs.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for job in &details.jobs {
        println!(
            "  {} {} [{}] {}",
            "▸".cyan(),
            job.name.bold(),
            colorize_job_status(job.status),
            job.worker_class.dimmed()
        );
        println!("    ID: {}", job.id.to_string().dimmed());
        for condition in &job.start_conditions {
            let preceding = names
                .get(&condition.preceding_job_id)
                .copied()
                .unwrap_or("?");
            println!(
                "    after {} ({})",
                preceding.cyan(),
                condition.condition.as_str()
            );
        }
    }
}
