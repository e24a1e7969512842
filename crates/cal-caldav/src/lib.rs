//! CalDAV transport for the calendar gateway
//!
//! Provides [`CaldavClient`], an HTTP CalDAV client that implements the
//! engine's `RemoteSource` trait.

pub mod client;
pub mod error;

pub use client::CaldavClient;
pub use error::{CaldavError, Result};
