//! HTTP API handlers
//!
//! Request handlers for tool listing and invocation.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use cal_core::ToolDefinition;

use crate::error::ApiError;
use crate::server::AppState;

/// Tool invocation response payload
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    /// Tool output; JSON when the tool emits JSON, a plain string otherwise
    pub output: Value,
    pub is_error: bool,
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// List the registered tools and their input schemas
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDefinition>> {
    Json(state.tools.definitions())
}

/// Invoke a tool by name with a JSON input payload
pub async fn execute_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    input: Option<Json<Value>>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let Json(input) = input.unwrap_or_else(|| Json(Value::Object(Default::default())));
    debug!("Executing tool '{}' with input: {}", name, input);

    let tool = state
        .tools
        .get(&name)
        .ok_or_else(|| ApiError::ToolNotFound(name.clone()))?;

    let result = tool.execute(input).await?;
    if result.is_error {
        error!("Tool '{}' reported an error: {}", name, result.output);
    }

    // Tools emit JSON strings; pass them through structured when they parse
    let output = serde_json::from_str(&result.output)
        .unwrap_or_else(|_| Value::String(result.output.clone()));

    Ok(Json(ExecuteResponse {
        output,
        is_error: result.is_error,
    }))
}
