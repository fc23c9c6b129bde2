//! Job command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_core::domain::job::Job;
use sluice_core::domain::log::{LogEntry, LogLevel};

use super::colorize_job_status;
use crate::config::Config;
use crate::id_resolver::resolve_job_id;
use sluice_client::ControllerClient;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Get job details
    Get {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Run a single job without its dependents
    Run {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Get job logs
    Logs {
        /// Job ID or unambiguous prefix
        id: String,

        /// Only show warnings and errors
        #[arg(short, long)]
        errors: bool,
    },
    /// Delete a job
    Delete {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = ControllerClient::new(&config.controller_url);

    match command {
        JobCommands::Get { id } => get_job(&client, &id).await,
        JobCommands::Run { id } => run_job(&client, &id).await,
        JobCommands::Logs { id, errors } => get_job_logs(&client, &id, errors).await,
        JobCommands::Delete { id } => delete_job(&client, &id).await,
    }
}

async fn get_job(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;

    let job = client.get_job(uuid).await?;

    print_job_details(&job);

    Ok(())
}

async fn run_job(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;

    let job = client.run_job(uuid).await?;

    println!("{}", "✓ Job started!".green().bold());
    println!("  Job:    {}", job.name.bold());
    println!("  Status: {}", colorize_job_status(job.status));

    Ok(())
}

async fn get_job_logs(client: &ControllerClient, id: &str, errors_only: bool) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;

    let logs: Vec<LogEntry> = client
        .get_job_logs(uuid)
        .await?
        .into_iter()
        .filter(|l| !errors_only || matches!(l.level, LogLevel::Warning | LogLevel::Error))
        .collect();

    if logs.is_empty() {
        println!("{}", "No logs found for this job.".yellow());
    } else {
        println!("{}", format!("Logs for job {}:", uuid).bold());
        println!("{}", "─".repeat(80).dimmed());
        for log in &logs {
            print_log_entry(log);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

async fn delete_job(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;

    client.delete_job(uuid).await?;

    println!(
        "{}",
        format!("✓ Job {} deleted successfully!", uuid).green().bold()
    );

    Ok(())
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Name:        {}", job.name.bold());
    println!("  Pipeline ID: {}", job.pipeline_id.to_string().dimmed());
    println!("  Worker:      {}", job.worker_class);
    println!("  Status:      {}", colorize_job_status(job.status));
    println!("  Tasks:       {}", job.enqueued_tasks);
    println!(
        "  Updated:     {}",
        job.updated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if !job.params.is_empty() {
        println!("\n{}", "Parameters:".bold());
        for param in &job.params {
            println!("  {} = {}", param.name.cyan(), param.value);
        }
    }
}

/// Print a log entry
fn print_log_entry(log: &LogEntry) {
    let level_str = log.level.as_str().to_uppercase();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        log.message
    );
}
