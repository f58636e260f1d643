use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fincat_engine::CategorizeError;
use serde_json::json;
use std::fmt;

/// Error body returned by every endpoint.
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    pub error_code: &'static str,
}

impl ApiError {
    pub fn validation(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            status_code: StatusCode::UNPROCESSABLE_ENTITY,
            error_code: "VALIDATION_ERROR",
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            error_code: "INTERNAL_ERROR",
        }
    }

    /// Bad input stays a 422; anything else becomes a 500 prefixed with `operation`.
    pub fn from_categorize(err: CategorizeError, operation: &str) -> Self {
        if err.is_validation() {
            Self::validation(err)
        } else {
            tracing::error!(error = %err, "{operation} failed");
            Self::internal(format!("{operation} failed: {err}"))
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status_code = rejection.status();
        let error_code = match status_code {
            StatusCode::UNPROCESSABLE_ENTITY => "VALIDATION_ERROR",
            StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
            _ => "INVALID_BODY",
        };
        Self {
            message: rejection.body_text(),
            status_code,
            error_code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": true,
            "message": self.message,
            "status": self.status_code.as_u16(),
            "error_code": self.error_code,
        });
        (self.status_code, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
