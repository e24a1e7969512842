//! Tool system for the command gateway
//!
//! This module provides the tool abstraction that calendar operations
//! are exposed through: named tools with a JSON schema, dispatched by
//! name over the request/response channel.

pub mod definition;
pub mod manager;
pub mod traits;

pub use definition::ToolDefinition;
pub use manager::ToolManager;
pub use traits::{Tool, ToolResult};
