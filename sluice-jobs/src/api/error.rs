//! API Error Handling

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sluice_core::channel::ChannelError;
use sluice_core::dto::message::PushError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Delivered before its start time, answered 419
    TooEarly(i64),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::error!("Rejecting malformed task: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::TooEarly(start_time) => (
                StatusCode::from_u16(419).unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                format!("Too early, retry at {}", start_time),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
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

impl From<ChannelError> for ApiError {
    fn from(err: ChannelError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
