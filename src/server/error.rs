use crate::utils::error::{ErrorCategory, ExhibitError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// HTTP 回應用的錯誤包裝
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub suggestion: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    suggestion: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error,
            "Correct the request fields and try again",
        )
    }
}

pub fn status_for(err: &ExhibitError) -> StatusCode {
    match err {
        ExhibitError::NotFound { .. } => StatusCode::NOT_FOUND,
        ExhibitError::ProcessingError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => match err.category() {
            ErrorCategory::Input | ErrorCategory::Configuration => StatusCode::BAD_REQUEST,
            ErrorCategory::Processing => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::External | ErrorCategory::System => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl From<ExhibitError> for ApiError {
    fn from(err: ExhibitError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", err);
        } else {
            tracing::warn!("⚠️ Request rejected: {}", err);
        }
        Self::new(status, err.user_friendly_message(), err.recovery_suggestion())
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::new(
            err.status(),
            format!("Invalid upload: {}", err.body_text()),
            "Send the files as multipart/form-data within the upload size limit",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.error,
            suggestion: &self.suggestion,
        };
        (self.status, Json(body)).into_response()
    }
}
