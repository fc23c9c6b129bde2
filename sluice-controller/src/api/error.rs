//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sluice_core::dto::message::PushError;

use crate::service::ServiceError;
use crate::store::StoreError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// The request conflicts with the current state (e.g. a running pipeline)
    Conflict(String),
    /// A channel message arrived before its start time
    TooEarly(i64),
    DatabaseError(StoreError),
    InternalError(String),
}

/// Status used to ask the channel to redeliver a message later
pub fn too_early_status() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::TooEarly(start_time) => {
                tracing::debug!("Message delivered before its start time {}", start_time);
                (
                    too_early_status(),
                    format!("Too early, retry at {}", start_time),
                )
            }
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::PipelineNotFound(_) | ServiceError::JobNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ServiceError::Blocked(_) | ServiceError::InvalidState(_) => {
                ApiError::Conflict(err.to_string())
            }
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::Store(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<PushError> for ApiError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::Malformed(msg) => ApiError::BadRequest(msg),
            PushError::TooEarly { start_time } => ApiError::TooEarly(start_time),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
