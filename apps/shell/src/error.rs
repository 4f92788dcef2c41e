//! Errors surfaced to clients of the shell proxy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    /// A write could not reach the origin.
    #[error("Offline")]
    Offline,

    /// Nothing cached and no offline page to fall back to.
    #[error("Service unavailable")]
    Unavailable,

    /// A pass-through request failed upstream.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ShellError {
    fn into_response(self) -> Response {
        match self {
            // Mirrors what the client-side code expects from a failed API write.
            ShellError::Offline => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "Offline".to_string(),
                }),
            )
                .into_response(),
            ShellError::Unavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
            }
            ShellError::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()).into_response(),
            ShellError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_is_503() {
        let response = ShellError::Offline.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );
    }

    #[test]
    fn unavailable_is_503() {
        let response = ShellError::Unavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_is_502() {
        let response = ShellError::Upstream("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn error_display() {
        assert_eq!(ShellError::Offline.to_string(), "Offline");
        assert_eq!(
            ShellError::BadRequest("body too large".to_string()).to_string(),
            "Bad request: body too large"
        );
    }
}
