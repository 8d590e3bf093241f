//! Handler errors, rendered as `{"message": ...}` with a matching status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl DemoError {
    fn status(&self) -> StatusCode {
        match self {
            DemoError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DemoError::Forbidden(_) => StatusCode::FORBIDDEN,
            DemoError::NotFound(_) => StatusCode::NOT_FOUND,
            DemoError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DemoError::Conflict(_) => StatusCode::CONFLICT,
            DemoError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DemoError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
