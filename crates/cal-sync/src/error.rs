//! Error types for cal-sync

use thiserror::Error;

use crate::remote::RemoteError;

/// cal-sync error type
#[derive(Error, Debug)]
pub enum SyncError {
    /// The gateway was started without CalDAV credentials
    #[error("CalDAV remote source is not configured")]
    NotConfigured,

    #[error("Calendar '{0}' not found on server")]
    CalendarNotFound(String),

    #[error("Event '{uid}' not found in calendar '{calendar}'")]
    EventNotFound { calendar: String, uid: String },

    #[error("Remote source error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Cache store error: {0}")]
    Cache(#[from] cal_cache::CacheError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
