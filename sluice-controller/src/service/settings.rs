//! Settings Service
//!
//! General settings are process-wide key/value pairs (credentials, tokens)
//! handed to every task; workers pick the ones they declare.

use sluice_core::domain::setting::GeneralSetting;
use tracing::info;

use super::{Result, ServiceError};
use crate::store::Store;

/// List all general settings
pub async fn list_settings(store: &dyn Store) -> Result<Vec<GeneralSetting>> {
    Ok(store.list_settings().await?)
}

/// Create or replace a general setting
pub async fn put_setting(store: &dyn Store, name: &str, value: &str) -> Result<GeneralSetting> {
    validate_setting_name(name)?;

    let setting = store.put_setting(name, value).await?;

    info!("General setting '{}' updated", setting.name);

    Ok(setting)
}

fn validate_setting_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Setting name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(ServiceError::Validation(
            "Setting name is too long (max 255 characters)".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ServiceError::Validation(format!(
            "Setting name '{}' may only contain letters, digits, '_', '-' and '.'",
            name
        )));
    }

    Ok(())
}
