//! Error types for cal-caldav

use thiserror::Error;

/// cal-caldav error type
#[derive(Error, Debug)]
pub enum CaldavError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("CalDAV error: {0}")]
    Caldav(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CaldavError>;
