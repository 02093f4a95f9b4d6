//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Which key carries the message in an error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStyle {
    /// `{"detail": "..."}`
    Detail,
    /// `{"error": "..."}`
    Error,
}

impl ErrorStyle {
    pub fn field(self) -> &'static str {
        match self {
            ErrorStyle::Detail => "detail",
            ErrorStyle::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub style: ErrorStyle,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, style: ErrorStyle) -> Self {
        Self { status, message: message.into(), style }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert(self.style.field().to_string(), Value::String(self.message));
        (self.status, Json(Value::Object(body))).into_response()
    }
}
