//! Data models for the cache store

use chrono::NaiveDateTime;
use serde::Serialize;

/// One mirrored calendar
///
/// Identity is the remote `url`, which never changes once the record is
/// created; `name` is display data and may be rewritten on sync.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarRecord {
    /// Local surrogate key
    pub id: i64,
    /// Display name
    pub name: String,
    /// Remote URL (unique identity key)
    pub url: String,
}

/// One mirrored event
///
/// `(calendar_id, uid)` is the reconciliation key. `start` and `end` are
/// canonical UTC wall-clock instants with no zone annotation.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Local surrogate key
    pub id: i64,
    /// Owning calendar
    pub calendar_id: i64,
    /// Remote-assigned identifier, stable across edits
    pub uid: String,
    /// Event title
    pub summary: String,
    /// Event description
    pub description: String,
    /// Event location
    pub location: String,
    /// Canonical start instant
    pub start: NaiveDateTime,
    /// Canonical end instant
    pub end: NaiveDateTime,
}

/// Event row joined with its calendar name, as returned by range queries
#[derive(Debug, Clone, Serialize)]
pub struct CachedEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Name of the owning calendar
    pub calendar: String,
}
