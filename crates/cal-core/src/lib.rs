//! cal-core: Calendar Gateway Core Library
//!
//! Shared configuration, error types, and the tool system that the
//! gateway exposes calendar operations through.

pub mod config;
pub mod error;
pub mod tool;

pub use config::{ApiConfig, CacheConfig, CaldavConfig, Config, SyncConfig};
pub use error::{Error, Result};
pub use tool::{Tool, ToolDefinition, ToolManager, ToolResult};
