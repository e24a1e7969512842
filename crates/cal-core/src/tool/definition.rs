//! Tool definition type
//!
//! Plain-data description of a registered tool, serialized when a
//! caller asks which tools are available.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Description of a registered tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name used for dispatch
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for the input payload
    pub input_schema: JsonValue,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: JsonValue,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}
