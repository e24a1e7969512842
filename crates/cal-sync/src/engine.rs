//! Reconciliation engine
//!
//! Mirrors remote calendar state into the local cache. Each sync pass
//! re-fetches the full event set of every calendar and derives a
//! three-way diff (create/update/delete) from set membership on uid; the
//! remote source is not assumed to support sync tokens, and the remote
//! side always wins. Each calendar commits as one transaction, so a
//! failure mid-pass leaves earlier calendars fully synced and the
//! failing one untouched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use cal_cache::{CacheStore, CachedEvent, CalendarRecord};

use crate::Result;
use crate::error::SyncError;
use crate::ical::parse_events;
use crate::remote::{EventDraft, RemoteCalendar, RemoteError, RemoteSource};

/// Outcome of one sync pass
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    /// Calendars fully synced
    pub calendars: usize,
    /// Events newly cached
    pub created: usize,
    /// Events whose fields changed
    pub updated: usize,
    /// Events removed because the remote no longer has them
    pub deleted: usize,
    /// Per-item and per-calendar failures that were tolerated
    pub warnings: Vec<String>,
}

/// The reconciliation engine
///
/// Holds the remote source, the cache store, and the serialization gate:
/// at most one sync (or write-through operation) runs at a time, while
/// cache reads bypass the gate entirely.
pub struct ReconciliationEngine {
    remote: Arc<dyn RemoteSource>,
    store: Arc<Mutex<CacheStore>>,
    sync_gate: Mutex<()>,
}

impl ReconciliationEngine {
    /// Create a new engine over a remote source and a cache store
    pub fn new(remote: Arc<dyn RemoteSource>, store: Arc<Mutex<CacheStore>>) -> Self {
        Self {
            remote,
            store,
            sync_gate: Mutex::new(()),
        }
    }

    /// Bring the cache into agreement with the current remote snapshot
    ///
    /// Calendars are processed sequentially; a failing calendar is
    /// recorded as a warning and does not stop the rest. Interleaved
    /// syncs would corrupt the mirror, so concurrent calls serialize
    /// behind the engine's gate.
    pub async fn sync(&self) -> Result<SyncReport> {
        let _gate = self.sync_gate.lock().await;
        self.sync_locked().await
    }

    /// Sync body; caller must hold the serialization gate
    async fn sync_locked(&self) -> Result<SyncReport> {
        let calendars = self.remote.list_calendars().await?;
        debug!("Remote enumerated {} calendars", calendars.len());

        let mut report = SyncReport::default();

        for calendar in &calendars {
            match self.sync_one_calendar(calendar, &mut report).await {
                Ok(()) => report.calendars += 1,
                Err(e) => {
                    warn!("Sync of calendar {} failed: {}", calendar.url, e);
                    report
                        .warnings
                        .push(format!("calendar {}: {}", calendar.url, e));
                }
            }
        }

        info!(
            "Sync complete: {} calendars, {} created, {} updated, {} deleted, {} warnings",
            report.calendars,
            report.created,
            report.updated,
            report.deleted,
            report.warnings.len()
        );
        Ok(report)
    }

    /// Sync one calendar as a single cache transaction
    async fn sync_one_calendar(
        &self,
        calendar: &RemoteCalendar,
        report: &mut SyncReport,
    ) -> Result<()> {
        let payloads = self.remote.list_events(&calendar.url).await?;

        // Map payloads before touching the store; one bad component only
        // costs itself.
        let mut parsed = Vec::new();
        for (idx, payload) in payloads.iter().enumerate() {
            for item in parse_events(payload) {
                match item {
                    Ok(event) => parsed.push(event),
                    Err(e) => {
                        warn!("Skipping object {} of {}: {}", idx + 1, calendar.url, e);
                        report
                            .warnings
                            .push(format!("calendar {}, object {}: {}", calendar.url, idx + 1, e));
                    }
                }
            }
        }

        let mut store = self.store.lock().await;
        let tx = store.transaction()?;

        let calendar_id = tx.upsert_calendar(calendar.name.as_deref(), &calendar.url)?;
        let existing_uids = tx.event_uids(calendar_id)?;

        let mut fetched_uids = HashSet::new();
        for event in &parsed {
            fetched_uids.insert(event.uid.clone());
            match tx.upsert_event(
                calendar_id,
                &event.uid,
                &event.summary,
                &event.description,
                &event.location,
                event.start,
                event.end,
            )? {
                cal_cache::UpsertOutcome::Created => report.created += 1,
                cal_cache::UpsertOutcome::Updated => report.updated += 1,
                cal_cache::UpsertOutcome::Unchanged => {}
            }
        }

        // Anything cached but no longer on the server is gone for good
        let to_delete: HashSet<String> = existing_uids
            .difference(&fetched_uids)
            .cloned()
            .collect();
        report.deleted += tx.delete_events(calendar_id, &to_delete)?;

        tx.commit()?;
        debug!("Calendar {} synced ({} events)", calendar.url, fetched_uids.len());
        Ok(())
    }

    /// Create an event on the remote server, then re-sync
    ///
    /// The cache is never written speculatively; the follow-up sync pulls
    /// the confirmed remote state, including the server-assigned uid.
    pub async fn create_event(&self, calendar_name: &str, draft: &EventDraft) -> Result<SyncReport> {
        let _gate = self.sync_gate.lock().await;

        let calendar = self.find_remote_calendar(calendar_name).await?;
        self.remote.create_event(&calendar.url, draft).await?;
        info!("Created event '{}' in {}", draft.summary, calendar.url);

        self.sync_locked().await
    }

    /// Delete an event from the remote server, then re-sync
    pub async fn delete_event(&self, calendar_name: &str, uid: &str) -> Result<SyncReport> {
        let _gate = self.sync_gate.lock().await;

        let calendar = self.find_remote_calendar(calendar_name).await?;
        self.remote
            .delete_event(&calendar.url, uid)
            .await
            .map_err(|e| match e {
                RemoteError::NotFound(_) => SyncError::EventNotFound {
                    calendar: calendar_name.to_string(),
                    uid: uid.to_string(),
                },
                other => other.into(),
            })?;
        info!("Deleted event {} from {}", uid, calendar.url);

        self.sync_locked().await
    }

    /// Resolve a calendar name against the remote server's enumeration
    async fn find_remote_calendar(&self, name: &str) -> Result<RemoteCalendar> {
        let calendars = self.remote.list_calendars().await?;
        calendars
            .into_iter()
            .find(|c| c.name.as_deref() == Some(name))
            .ok_or_else(|| SyncError::CalendarNotFound(name.to_string()))
    }

    /// List cached calendars
    pub async fn list_calendars(&self) -> Result<Vec<CalendarRecord>> {
        let store = self.store.lock().await;
        Ok(store.list_calendars()?)
    }

    /// List cached events whose start falls in `[start, end]`
    pub async fn list_events(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        calendar_name: Option<&str>,
    ) -> Result<Vec<CachedEvent>> {
        let store = self.store.lock().await;
        Ok(store.events_in_range(start, end, calendar_name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex as StdMutex;

    /// In-process remote source for engine tests
    #[derive(Default)]
    struct FakeRemote {
        /// url -> (name, payloads)
        calendars: StdMutex<Vec<(String, Option<String>, Vec<String>)>>,
        /// urls whose list_events call fails
        failing: StdMutex<HashSet<String>>,
    }

    impl FakeRemote {
        fn with_calendar(name: &str, url: &str, payloads: Vec<String>) -> Self {
            let remote = Self::default();
            remote
                .calendars
                .lock()
                .unwrap()
                .push((url.to_string(), Some(name.to_string()), payloads));
            remote
        }

        fn add_calendar(&self, name: Option<&str>, url: &str, payloads: Vec<String>) {
            self.calendars.lock().unwrap().push((
                url.to_string(),
                name.map(|n| n.to_string()),
                payloads,
            ));
        }

        fn set_payloads(&self, url: &str, payloads: Vec<String>) {
            let mut calendars = self.calendars.lock().unwrap();
            let entry = calendars.iter_mut().find(|(u, _, _)| u == url).unwrap();
            entry.2 = payloads;
        }

        fn rename(&self, url: &str, name: Option<&str>) {
            let mut calendars = self.calendars.lock().unwrap();
            let entry = calendars.iter_mut().find(|(u, _, _)| u == url).unwrap();
            entry.1 = name.map(|n| n.to_string());
        }

        fn fail_events_for(&self, url: &str) {
            self.failing.lock().unwrap().insert(url.to_string());
        }
    }

    #[async_trait]
    impl RemoteSource for FakeRemote {
        async fn list_calendars(&self) -> std::result::Result<Vec<RemoteCalendar>, RemoteError> {
            Ok(self
                .calendars
                .lock()
                .unwrap()
                .iter()
                .map(|(url, name, _)| RemoteCalendar {
                    name: name.clone(),
                    url: url.clone(),
                })
                .collect())
        }

        async fn list_events(
            &self,
            calendar_url: &str,
        ) -> std::result::Result<Vec<String>, RemoteError> {
            if self.failing.lock().unwrap().contains(calendar_url) {
                return Err(RemoteError::Transport("connection reset".to_string()));
            }
            Ok(self
                .calendars
                .lock()
                .unwrap()
                .iter()
                .find(|(u, _, _)| u == calendar_url)
                .map(|(_, _, p)| p.clone())
                .unwrap_or_default())
        }

        async fn create_event(
            &self,
            calendar_url: &str,
            draft: &EventDraft,
        ) -> std::result::Result<(), RemoteError> {
            let uid = uuid::Uuid::new_v4().to_string();
            let payload = vevent_with(
                &uid,
                &draft.summary,
                &draft.start.format("%Y%m%dT%H%M%S").to_string(),
            );
            let mut calendars = self.calendars.lock().unwrap();
            let entry = calendars
                .iter_mut()
                .find(|(u, _, _)| u == calendar_url)
                .ok_or_else(|| RemoteError::NotFound(calendar_url.to_string()))?;
            entry.2.push(payload);
            Ok(())
        }

        async fn delete_event(
            &self,
            calendar_url: &str,
            uid: &str,
        ) -> std::result::Result<(), RemoteError> {
            let mut calendars = self.calendars.lock().unwrap();
            let entry = calendars
                .iter_mut()
                .find(|(u, _, _)| u == calendar_url)
                .ok_or_else(|| RemoteError::NotFound(calendar_url.to_string()))?;
            let marker = format!("UID:{}", uid);
            let before = entry.2.len();
            entry.2.retain(|p| !p.contains(&marker));
            if entry.2.len() == before {
                return Err(RemoteError::NotFound(uid.to_string()));
            }
            Ok(())
        }
    }

    fn vevent_with(uid: &str, summary: &str, dtstart: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\n\
             UID:{}\r\nSUMMARY:{}\r\nDTSTART:{}\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
            uid, summary, dtstart
        )
    }

    fn vevent(uid: &str, summary: &str) -> String {
        vevent_with(uid, summary, "20240301T090000Z")
    }

    fn engine_over(remote: FakeRemote) -> (ReconciliationEngine, Arc<FakeRemote>) {
        let remote = Arc::new(remote);
        let store = Arc::new(Mutex::new(CacheStore::in_memory().unwrap()));
        let engine = ReconciliationEngine::new(remote.clone(), store);
        (engine, remote)
    }

    async fn cached_uids(engine: &ReconciliationEngine, url: &str) -> HashSet<String> {
        let store = engine.store.lock().await;
        let calendar = store.calendar_by_url(url).unwrap().unwrap();
        store
            .events_of(calendar.id)
            .unwrap()
            .into_iter()
            .map(|e| e.uid)
            .collect()
    }

    #[tokio::test]
    async fn test_sync_converges_to_remote_snapshot() {
        let remote = FakeRemote::with_calendar(
            "Work",
            "https://dav/work/",
            vec![vevent("a", "A"), vevent("b", "B")],
        );
        let (engine, _) = engine_over(remote);

        let report = engine.sync().await.unwrap();
        assert_eq!(report.calendars, 1);
        assert_eq!(report.created, 2);
        assert_eq!(report.deleted, 0);
        assert!(report.warnings.is_empty());

        let uids = cached_uids(&engine, "https://dav/work/").await;
        assert_eq!(uids, HashSet::from(["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let remote = FakeRemote::with_calendar(
            "Work",
            "https://dav/work/",
            vec![vevent("a", "A"), vevent("b", "B")],
        );
        let (engine, _) = engine_over(remote);

        engine.sync().await.unwrap();
        let second = engine.sync().await.unwrap();

        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.deleted, 0);
        assert!(second.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_sync_deletes_events_gone_from_remote() {
        let remote = FakeRemote::with_calendar(
            "Work",
            "https://dav/work/",
            vec![vevent("a", "A"), vevent("b", "B")],
        );
        let (engine, fake) = engine_over(remote);
        engine.sync().await.unwrap();

        // Remote now only has "a"
        fake.set_payloads("https://dav/work/", vec![vevent("a", "A")]);

        let report = engine.sync().await.unwrap();
        assert_eq!(report.deleted, 1);

        let uids = cached_uids(&engine, "https://dav/work/").await;
        assert_eq!(uids, HashSet::from(["a".to_string()]));
    }

    #[tokio::test]
    async fn test_sync_updates_changed_event_in_place() {
        let remote =
            FakeRemote::with_calendar("Work", "https://dav/work/", vec![vevent("a", "Old title")]);
        let (engine, fake) = engine_over(remote);
        engine.sync().await.unwrap();

        fake.set_payloads("https://dav/work/", vec![vevent("a", "New title")]);

        let report = engine.sync().await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 1);

        let store = engine.store.lock().await;
        let calendar = store.calendar_by_url("https://dav/work/").unwrap().unwrap();
        let events = store.events_of(calendar.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "New title");
    }

    #[tokio::test]
    async fn test_malformed_object_does_not_abort_calendar() {
        let malformed = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:No uid\r\n\
                         DTSTART:20240301T090000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let remote = FakeRemote::with_calendar(
            "Work",
            "https://dav/work/",
            vec![vevent("a", "A"), malformed.to_string(), vevent("b", "B")],
        );
        let (engine, _) = engine_over(remote);

        let report = engine.sync().await.unwrap();
        assert_eq!(report.calendars, 1);
        assert_eq!(report.created, 2);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("object 2"));

        let uids = cached_uids(&engine, "https://dav/work/").await;
        assert_eq!(uids.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_calendar_does_not_block_others() {
        let remote = FakeRemote::with_calendar("Work", "https://dav/work/", vec![vevent("a", "A")]);
        remote.add_calendar(Some("Home"), "https://dav/home/", vec![vevent("h", "H")]);
        remote.fail_events_for("https://dav/work/");
        let (engine, _) = engine_over(remote);

        let report = engine.sync().await.unwrap();
        assert_eq!(report.calendars, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("https://dav/work/"));

        let uids = cached_uids(&engine, "https://dav/home/").await;
        assert_eq!(uids, HashSet::from(["h".to_string()]));
    }

    #[tokio::test]
    async fn test_failing_calendar_keeps_previous_state() {
        let remote = FakeRemote::with_calendar("Work", "https://dav/work/", vec![vevent("a", "A")]);
        let (engine, fake) = engine_over(remote);
        engine.sync().await.unwrap();

        fake.fail_events_for("https://dav/work/");

        let report = engine.sync().await.unwrap();
        assert_eq!(report.calendars, 0);
        assert_eq!(report.warnings.len(), 1);

        // The previously committed snapshot survives the failed pass
        let uids = cached_uids(&engine, "https://dav/work/").await;
        assert_eq!(uids, HashSet::from(["a".to_string()]));
    }

    #[tokio::test]
    async fn test_empty_remote_wipes_calendar() {
        let remote = FakeRemote::with_calendar(
            "Work",
            "https://dav/work/",
            vec![vevent("a", "A"), vevent("b", "B")],
        );
        let (engine, fake) = engine_over(remote);
        engine.sync().await.unwrap();

        fake.set_payloads("https://dav/work/", vec![]);

        let report = engine.sync().await.unwrap();
        assert_eq!(report.deleted, 2);
        assert!(cached_uids(&engine, "https://dav/work/").await.is_empty());
    }

    #[tokio::test]
    async fn test_calendar_rename_updates_record() {
        let remote = FakeRemote::with_calendar("Work", "https://dav/work/", vec![]);
        let (engine, fake) = engine_over(remote);
        engine.sync().await.unwrap();

        fake.rename("https://dav/work/", Some("Work 2024"));

        engine.sync().await.unwrap();

        let calendars = engine.list_calendars().await.unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].name, "Work 2024");
    }

    #[tokio::test]
    async fn test_missing_remote_name_keeps_cached_name() {
        let remote = FakeRemote::with_calendar("Work", "https://dav/work/", vec![]);
        let (engine, fake) = engine_over(remote);
        engine.sync().await.unwrap();

        // A transiently absent displayname must not overwrite the name
        fake.rename("https://dav/work/", None);

        engine.sync().await.unwrap();

        let calendars = engine.list_calendars().await.unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].name, "Work");
    }

    #[tokio::test]
    async fn test_unnamed_calendar_defaults_to_unknown() {
        let remote = FakeRemote::default();
        remote.add_calendar(None, "https://dav/anon/", vec![]);
        let (engine, _) = engine_over(remote);
        engine.sync().await.unwrap();

        let calendars = engine.list_calendars().await.unwrap();
        assert_eq!(calendars[0].name, "Unknown");
    }

    #[tokio::test]
    async fn test_write_through_create_then_delete() {
        let remote = FakeRemote::with_calendar("Work", "https://dav/work/", vec![]);
        let (engine, _) = engine_over(remote);

        let day_start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let day_end = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();

        let draft = EventDraft {
            summary: "Standup".to_string(),
            description: String::new(),
            location: String::new(),
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 15, 0).unwrap(),
        };
        engine.create_event("Work", &draft).await.unwrap();

        let events = engine.list_events(day_start, day_end, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Standup");
        let uid = events[0].uid.clone();

        engine.delete_event("Work", &uid).await.unwrap();
        let events = engine.list_events(day_start, day_end, None).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_create_event_unknown_calendar() {
        let remote = FakeRemote::with_calendar("Work", "https://dav/work/", vec![]);
        let (engine, _) = engine_over(remote);

        let draft = EventDraft {
            summary: "X".to_string(),
            description: String::new(),
            location: String::new(),
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap(),
        };
        let err = engine.create_event("Personal", &draft).await.unwrap_err();
        assert!(matches!(err, SyncError::CalendarNotFound(name) if name == "Personal"));
    }

    #[tokio::test]
    async fn test_delete_event_unknown_uid() {
        let remote = FakeRemote::with_calendar("Work", "https://dav/work/", vec![]);
        let (engine, _) = engine_over(remote);

        let err = engine.delete_event("Work", "missing-uid").await.unwrap_err();
        assert!(matches!(err, SyncError::EventNotFound { uid, .. } if uid == "missing-uid"));
    }
}
