//! Cache storage implementation using SQLite

use std::collections::HashSet;

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use crate::Result;
use crate::models::{CachedEvent, CalendarRecord, EventRecord};

/// Timestamp encoding used in the database.
///
/// Lexicographic order of this format equals chronological order, so range
/// filters are plain string comparisons.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn encode_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn decode_ts(idx: usize, raw: &str) -> std::result::Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite-based cache of remote calendar state
pub struct CacheStore {
    conn: Connection,
}

impl CacheStore {
    /// Create a new CacheStore with the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening cache database at: {}", db_path);
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_tables()?;
        info!("CacheStore initialized successfully");
        Ok(store)
    }

    /// Create an in-memory CacheStore (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS calendars (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY,
                calendar_id INTEGER NOT NULL
                    REFERENCES calendars(id) ON DELETE CASCADE,
                uid TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                start TEXT NOT NULL,
                end TEXT NOT NULL,
                UNIQUE(calendar_id, uid)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_start ON events(start)",
            [],
        )?;

        Ok(())
    }

    /// List all cached calendars
    pub fn list_calendars(&self) -> Result<Vec<CalendarRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, url FROM calendars ORDER BY name")?;

        let calendars = stmt
            .query_map([], |row| {
                Ok(CalendarRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(calendars)
    }

    /// Look up a calendar by its remote URL
    pub fn calendar_by_url(&self, url: &str) -> Result<Option<CalendarRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, url FROM calendars WHERE url = ?1")?;

        let calendar = stmt
            .query_row(params![url], |row| {
                Ok(CalendarRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                })
            })
            .optional()?;

        Ok(calendar)
    }

    /// List all events of one calendar
    pub fn events_of(&self, calendar_id: i64) -> Result<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, calendar_id, uid, summary, description, location, start, end
             FROM events WHERE calendar_id = ?1 ORDER BY start",
        )?;

        let events = stmt
            .query_map(params![calendar_id], |row| {
                let start: String = row.get(6)?;
                let end: String = row.get(7)?;
                Ok(EventRecord {
                    id: row.get(0)?,
                    calendar_id: row.get(1)?,
                    uid: row.get(2)?,
                    summary: row.get(3)?,
                    description: row.get(4)?,
                    location: row.get(5)?,
                    start: decode_ts(6, &start)?,
                    end: decode_ts(7, &end)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// List events whose start falls in `[start, end]`, joined with their
    /// calendar name, optionally filtered to one calendar
    pub fn events_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        calendar_name: Option<&str>,
    ) -> Result<Vec<CachedEvent>> {
        let base = "SELECT e.uid, e.summary, e.description, e.location, e.start, e.end, c.name
                    FROM events e JOIN calendars c ON e.calendar_id = c.id
                    WHERE e.start >= ?1 AND e.start <= ?2";

        let map_row = |row: &rusqlite::Row| {
            let start: String = row.get(4)?;
            let end: String = row.get(5)?;
            Ok(CachedEvent {
                uid: row.get(0)?,
                summary: row.get(1)?,
                description: row.get(2)?,
                location: row.get(3)?,
                start: decode_ts(4, &start)?,
                end: decode_ts(5, &end)?,
                calendar: row.get(6)?,
            })
        };

        let events = match calendar_name {
            Some(name) => {
                let sql = format!("{} AND c.name = ?3 ORDER BY e.start", base);
                let mut stmt = self.conn.prepare(&sql)?;
                stmt.query_map(params![encode_ts(start), encode_ts(end), name], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{} ORDER BY e.start", base);
                let mut stmt = self.conn.prepare(&sql)?;
                stmt.query_map(params![encode_ts(start), encode_ts(end)], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        debug!("Range query returned {} events", events.len());
        Ok(events)
    }

    /// Begin a write transaction
    ///
    /// One transaction covers one calendar's sync pass; dropping the
    /// handle without calling [`CacheTx::commit`] rolls everything back.
    pub fn transaction(&mut self) -> Result<CacheTx<'_>> {
        Ok(CacheTx {
            tx: self.conn.transaction()?,
        })
    }
}

/// Result of an event upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was inserted
    Created,
    /// An existing row's fields were overwritten
    Updated,
    /// The existing row already matched
    Unchanged,
}

/// Write transaction over the cache store
pub struct CacheTx<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl CacheTx<'_> {
    /// Insert a calendar or update its display name in place
    ///
    /// The remote URL is the identity key and is never rewritten. The
    /// name follows the remote side only when the remote supplies one;
    /// `None` keeps the cached name, falling back to "Unknown" on first
    /// insert. Returns the local id.
    pub fn upsert_calendar(&self, name: Option<&str>, url: &str) -> Result<i64> {
        let existing = self
            .tx
            .query_row(
                "SELECT id, name FROM calendars WHERE url = ?1",
                params![url],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match existing {
            Some((id, current_name)) => {
                if let Some(name) = name {
                    if current_name != name {
                        self.tx.execute(
                            "UPDATE calendars SET name = ?1 WHERE id = ?2",
                            params![name, id],
                        )?;
                        debug!("Renamed calendar {} to {}", id, name);
                    }
                }
                Ok(id)
            }
            None => {
                let name = name.unwrap_or("Unknown");
                self.tx.execute(
                    "INSERT INTO calendars (name, url) VALUES (?1, ?2)",
                    params![name, url],
                )?;
                let id = self.tx.last_insert_rowid();
                info!("New calendar cached: {} ({})", name, url);
                Ok(id)
            }
        }
    }

    /// Snapshot the set of uids currently cached for one calendar
    pub fn event_uids(&self, calendar_id: i64) -> Result<HashSet<String>> {
        let mut stmt = self
            .tx
            .prepare("SELECT uid FROM events WHERE calendar_id = ?1")?;

        let uids = stmt
            .query_map(params![calendar_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;

        Ok(uids)
    }

    /// Insert an event or overwrite its mutable fields in place
    ///
    /// A row whose fields already match the given values is left alone so
    /// that a re-sync against an unchanged remote snapshot reports no
    /// updates.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_event(
        &self,
        calendar_id: i64,
        uid: &str,
        summary: &str,
        description: &str,
        location: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<UpsertOutcome> {
        let start_raw = encode_ts(start);
        let end_raw = encode_ts(end);

        let existing = self
            .tx
            .query_row(
                "SELECT summary, description, location, start, end
                 FROM events WHERE calendar_id = ?1 AND uid = ?2",
                params![calendar_id, uid],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                self.tx.execute(
                    "INSERT INTO events (calendar_id, uid, summary, description, location, start, end)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![calendar_id, uid, summary, description, location, start_raw, end_raw],
                )?;
                Ok(UpsertOutcome::Created)
            }
            Some(row)
                if row == (
                    summary.to_string(),
                    description.to_string(),
                    location.to_string(),
                    start_raw.clone(),
                    end_raw.clone(),
                ) =>
            {
                Ok(UpsertOutcome::Unchanged)
            }
            Some(_) => {
                self.tx.execute(
                    "UPDATE events SET summary = ?1, description = ?2, location = ?3,
                                       start = ?4, end = ?5
                     WHERE calendar_id = ?6 AND uid = ?7",
                    params![summary, description, location, start_raw, end_raw, calendar_id, uid],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Bulk-delete events of one calendar by uid
    ///
    /// Returns the number of rows deleted.
    pub fn delete_events(&self, calendar_id: i64, uids: &HashSet<String>) -> Result<usize> {
        if uids.is_empty() {
            return Ok(0);
        }

        let placeholders = (2..=uids.len() + 1)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DELETE FROM events WHERE calendar_id = ?1 AND uid IN ({})",
            placeholders
        );

        let mut values: Vec<rusqlite::types::Value> = vec![calendar_id.into()];
        values.extend(uids.iter().map(|u| u.clone().into()));

        let deleted = self.tx.execute(&sql, params_from_iter(values))?;
        debug!("Deleted {} events from calendar {}", deleted, calendar_id);
        Ok(deleted)
    }

    /// Commit the transaction
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}
