//! HTTP error mapping

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pv_core::CoreError;
use pv_data::DataError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error returned by every handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid upload: {0}")]
    Upload(#[from] MultipartError),
}

impl ApiError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ApiError::Core(CoreError::MalformedInput(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::MalformedInput(_) | CoreError::ValidationFailed(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<DataError> for ApiError {
    fn from(error: DataError) -> Self {
        ApiError::Core(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
