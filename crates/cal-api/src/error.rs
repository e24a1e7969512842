//! Error types for cal-api

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// cal-api error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tool error: {0}")]
    Tool(#[from] cal_core::Error),
}

/// Generic API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            // Bad tool parameters come back as client errors
            ApiError::Tool(cal_core::Error::ToolExecution(_)) => StatusCode::BAD_REQUEST,
            ApiError::Tool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;
