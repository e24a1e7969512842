//! Error types for cal-cache

use thiserror::Error;

/// cal-cache error type
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CacheError>;
