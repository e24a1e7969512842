//! Remote source contract
//!
//! The reconciliation engine only ever talks to the remote calendar
//! server through this trait; the concrete CalDAV client lives in the
//! cal-caldav crate, and tests substitute in-process fakes.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

/// Remote source failure modes
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// One calendar as enumerated by the remote server
#[derive(Debug, Clone)]
pub struct RemoteCalendar {
    /// Display name, if the server supplies one
    pub name: Option<String>,
    /// Collection URL (the calendar's identity)
    pub url: String,
}

/// Fields of an event to be created on the remote server
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Remote calendar server operations consumed by the engine
///
/// `list_events` returns raw iCalendar object payloads; interpreting
/// them is the engine's job, not the transport's.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Enumerate the calendars available on the server
    async fn list_calendars(&self) -> std::result::Result<Vec<RemoteCalendar>, RemoteError>;

    /// Fetch the raw iCalendar payloads of every object in one calendar
    async fn list_events(&self, calendar_url: &str)
    -> std::result::Result<Vec<String>, RemoteError>;

    /// Create an event in one calendar
    async fn create_event(
        &self,
        calendar_url: &str,
        draft: &EventDraft,
    ) -> std::result::Result<(), RemoteError>;

    /// Delete an event by uid from one calendar
    async fn delete_event(
        &self,
        calendar_url: &str,
        uid: &str,
    ) -> std::result::Result<(), RemoteError>;
}
