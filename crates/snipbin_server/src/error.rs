//! HTTP error mapping for API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use snipbin_core::AppError;

/// Error returned by handlers; renders as `{"error": "..."}`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Token is valid but does not grant the requested action.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound => Self::new(StatusCode::NOT_FOUND, "Not found"),
            AppError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => Self::new(StatusCode::UNAUTHORIZED, msg),
            AppError::StorageMessage(msg) => {
                tracing::error!("Storage error: {}", msg);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
            }
            other => {
                tracing::error!("Internal error: {:?}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (AppError::Transient("slow".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::StorageMessage("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status(), expected);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = HttpError::from(AppError::StorageMessage("/secret/path".into()));
        assert_eq!(err.message, "Storage error");
    }
}
