//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod pipeline;
mod setting;

pub use job::JobCommands;
pub use pipeline::PipelineCommands;
pub use setting::SettingCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_core::domain::job::JobStatus;
use sluice_core::domain::pipeline::PipelineStatus;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// General settings
    Setting {
        #[command(subcommand)]
        command: SettingCommands,
    },
}

/// Handle a CLI command
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Setting { command } => setting::handle_setting_command(command, config).await,
    }
}

/// Colorize job status for display
fn colorize_job_status(status: JobStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        JobStatus::Idle => text.dimmed(),
        JobStatus::Waiting => text.blue(),
        JobStatus::Running => text.cyan(),
        JobStatus::Succeeded => text.green(),
        JobStatus::Failed => text.red(),
        JobStatus::Stopping => text.yellow(),
    }
}

/// Colorize pipeline status for display
fn colorize_pipeline_status(status: PipelineStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        PipelineStatus::Idle => text.dimmed(),
        PipelineStatus::Running => text.cyan(),
        PipelineStatus::Succeeded => text.green(),
        PipelineStatus::Failed => text.red(),
        PipelineStatus::Stopping => text.yellow(),
    }
}
