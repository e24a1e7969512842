//! cal-sync: Reconciliation engine for cal-gateway
//!
//! The core of the gateway: given a remote snapshot of calendars and
//! events and the current cache contents, compute and apply the minimal
//! set of create/update/delete operations to bring the cache into exact
//! agreement with the remote source. Individual malformed objects and
//! failing calendars are tolerated and reported as warnings rather than
//! aborting the whole pass.

pub mod context;
pub mod engine;
pub mod error;
pub mod ical;
pub mod remote;
pub mod time;
pub mod tools;

pub use context::CalendarContext;
pub use engine::{ReconciliationEngine, SyncReport};
pub use error::{Result, SyncError};
pub use ical::{IcalError, ParsedEvent, parse_events};
pub use remote::{EventDraft, RemoteCalendar, RemoteError, RemoteSource};
pub use time::RemoteTimestamp;
pub use tools::register_calendar_tools;
