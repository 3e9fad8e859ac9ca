//! # Response envelope
//!
//! Every route answers `{"error": bool, "message": string, ...result keys}`.

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tc_core::AppError;
use tracing::{error, warn};

/// A successful envelope under construction.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Map<String, Value>,
}

impl ApiResponse {
    pub fn ok(message: &str) -> Self {
        Self::with_status(StatusCode::OK, message)
    }

    pub fn created(message: &str) -> Self {
        Self::with_status(StatusCode::CREATED, message)
    }

    fn with_status(status: StatusCode, message: &str) -> Self {
        let mut body = Map::new();
        body.insert("error".into(), Value::Bool(false));
        body.insert("message".into(), Value::String(message.to_string()));
        Self { status, body }
    }

    /// Adds a result key to the envelope.
    pub fn with<T: Serialize>(mut self, key: &str, value: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(value)
            .map_err(|err| AppError::Internal(format!("serializing {key}: {err}")))?;
        self.body.insert(key.to_string(), value);
        Ok(self)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(Value::Object(self.body))).into_response()
    }
}

/// Any failure surfaced to an HTTP client.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_, _) => StatusCode::NOT_FOUND,
            AppError::DuplicateVote { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::Validation(rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self(AppError::Validation(format!("invalid multipart body: {}", err.body_text())))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();
        if status.is_server_error() {
            error!(%status, %message, "Request failed");
        } else {
            warn!(%status, %message, "Request rejected");
        }

        let body = Json(serde_json::json!({ "error": true, "message": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::not_found("thread", "t1"), StatusCode::NOT_FOUND),
            (
                AppError::DuplicateVote {
                    thread_id: "t1".into(),
                    user_id: "u1".into(),
                },
                StatusCode::CONFLICT,
            ),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn test_envelope_carries_result_key() {
        let response = ApiResponse::ok("success").with("upVotes", &3u64).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["error"], Value::Bool(false));
        assert_eq!(response.body["upVotes"], 3);
    }
}
