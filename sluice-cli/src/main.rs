//! Sluice CLI
//!
//! Command-line interface for operating the Sluice controller.

mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Sluice data pipeline CLI", long_about = None)]
struct Cli {
    /// Controller URL
    #[arg(
        long,
        env = "SLUICE_CONTROLLER_URL",
        default_value = "http://localhost:8080"
    )]
    controller_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        controller_url: cli.controller_url,
    };

    handle_command(cli.command, &config).await
}
