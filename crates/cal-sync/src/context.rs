//! Shared calendar context
//!
//! One context object is constructed at startup and handed to every
//! request handler. When the remote source is not configured the context
//! is built in the disabled state and each operation reports a clear
//! per-request failure instead of the process crashing at boot.

use std::sync::Arc;

use crate::Result;
use crate::engine::ReconciliationEngine;
use crate::error::SyncError;

/// Handle to the engine shared by all calendar tools
pub struct CalendarContext {
    engine: Option<Arc<ReconciliationEngine>>,
}

impl CalendarContext {
    /// Create a context around a working engine
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self {
            engine: Some(Arc::new(engine)),
        }
    }

    /// Create a disabled context (no CalDAV credentials available)
    pub fn disabled() -> Self {
        Self { engine: None }
    }

    /// Whether the remote source is configured
    pub fn is_enabled(&self) -> bool {
        self.engine.is_some()
    }

    /// Access the engine, or fail when the gateway runs disabled
    pub fn engine(&self) -> Result<&Arc<ReconciliationEngine>> {
        self.engine.as_ref().ok_or(SyncError::NotConfigured)
    }
}
