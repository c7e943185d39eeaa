use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use handover_core::HandoverError;
use serde_json::json;

/// Boundary error: everything a handler can fail with, rendered as
/// `{"error": ..., "details"?: ...}` JSON. Nothing crashes the process.
#[derive(Debug)]
pub enum ApiError {
    Handler(HandoverError),
    Unauthorized(String),
    Conflict(String),
}

impl From<HandoverError> for ApiError {
    fn from(err: HandoverError) -> Self {
        ApiError::Handler(err)
    }
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Handler(HandoverError::validation(msg))
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::Handler(HandoverError::not_found(entity, id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": msg }))
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::Handler(err) => match &err {
                HandoverError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, json!({ "error": msg }))
                }
                HandoverError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
                HandoverError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
                HandoverError::Parse(_) | HandoverError::Upstream(_) | HandoverError::Store(_) => {
                    tracing::error!(error = %err, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": "Internal server error", "details": err.to_string() }),
                    )
                }
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (
                ApiError::from(HandoverError::validation("bad")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(HandoverError::not_found("Interview", "x")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(HandoverError::conflict("nope")),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(HandoverError::parse("garbage")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::unauthorized("Authentication required"),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
