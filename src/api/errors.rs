//! API error types and HTTP status mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::KyonrunError;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Unknown script, or ad-hoc execution not configured.
    NotFound(String),
    /// The request is malformed for the target script.
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<KyonrunError> for ApiError {
    fn from(err: KyonrunError) -> Self {
        match err {
            KyonrunError::ScriptNotFound(id) => {
                ApiError::NotFound(format!("script not found: {id}"))
            }
            KyonrunError::SourceNotAccepted(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_errors_map_to_statuses() {
        let cases = [
            (KyonrunError::ScriptNotFound("x".into()), StatusCode::NOT_FOUND),
            (KyonrunError::SourceNotAccepted("x".into()), StatusCode::BAD_REQUEST),
            (KyonrunError::AdmissionClosed("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
