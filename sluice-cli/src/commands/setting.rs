//! General setting command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use crate::config::Config;
use sluice_client::ControllerClient;

/// Setting subcommands
#[derive(Subcommand)]
pub enum SettingCommands {
    /// List all general settings
    List,
    /// Create or replace a general setting
    Set {
        /// Setting name
        name: String,
        /// Setting value
        value: String,
    },
}

pub async fn handle_setting_command(command: SettingCommands, config: &Config) -> Result<()> {
    let client = ControllerClient::new(&config.controller_url);

    match command {
        SettingCommands::List => {
            let settings = client.list_settings().await?;
            if settings.is_empty() {
                println!("{}", "No settings found.".yellow());
            }
            for setting in settings {
                println!("  {} = {}", setting.name.cyan(), setting.value);
            }
        }
        SettingCommands::Set { name, value } => {
            let setting = client.put_setting(&name, value).await?;
            println!(
                "{}",
                format!("✓ Setting {} saved", setting.name).green().bold()
            );
        }
    }

    Ok(())
}
