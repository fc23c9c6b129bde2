//! General settings handlers

use axum::{
    Json,
    extract::{Path, State},
};
use sluice_core::domain::setting::GeneralSetting;
use sluice_core::dto::setting::PutSetting;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::settings_service;

/// GET /api/settings
pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Json<Vec<GeneralSetting>>> {
    let settings = settings_service::list_settings(state.store.as_ref()).await?;

    Ok(Json(settings))
}

/// PUT /api/settings/{name}
pub async fn put_setting(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PutSetting>,
) -> ApiResult<Json<GeneralSetting>> {
    let setting = settings_service::put_setting(state.store.as_ref(), &name, &req.value).await?;

    Ok(Json(setting))
}
