//! cal-cache: Local cache store for cal-gateway
//!
//! SQLite-backed mirror of remote calendar state. Calendars are keyed by
//! their remote URL, events by `(calendar_id, uid)`; all writes from a
//! sync pass go through a per-calendar transaction (`CacheTx`).

pub mod error;
pub mod models;
pub mod store;

pub use error::{CacheError, Result};
pub use models::{CachedEvent, CalendarRecord, EventRecord};
pub use store::{CacheStore, CacheTx, UpsertOutcome};
