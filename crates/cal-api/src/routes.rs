//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{execute_tool, health, list_tools};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Tool listing and invocation
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(execute_tool))
}
