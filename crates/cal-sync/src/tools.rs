//! Calendar tools for the command gateway
//!
//! Exposes the engine's operations as named tools: `list_calendars`,
//! `list_events`, `create_event`, `delete_event`, and `sync_calendar`.
//! Tool input is a JSON object matching the advertised schema; output is
//! a JSON string. Domain failures (unknown calendar, unknown uid, remote
//! not configured) come back as error results, not transport errors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::{Value, json};

use cal_core::{Tool, ToolManager, ToolResult};

use crate::context::CalendarContext;
use crate::remote::EventDraft;

/// Timestamp format used in tool output
const OUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse an ISO-8601-ish timestamp from tool input
///
/// Accepts `2024-03-01T09:00:00`, `2024-03-01T09:00`, and a bare date
/// (interpreted as midnight).
fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

fn required_str<'a>(input: &'a Value, key: &str) -> cal_core::Result<&'a str> {
    input[key]
        .as_str()
        .ok_or_else(|| cal_core::Error::ToolExecution(format!("Missing '{}' parameter", key)))
}

fn required_datetime(input: &Value, key: &str) -> cal_core::Result<NaiveDateTime> {
    let raw = required_str(input, key)?;
    parse_datetime(raw).ok_or_else(|| {
        cal_core::Error::ToolExecution(format!("Invalid '{}' timestamp: {}", key, raw))
    })
}

/// Register all calendar tools on a manager
pub fn register_calendar_tools(manager: &mut ToolManager, ctx: Arc<CalendarContext>) {
    manager.register(Arc::new(ListCalendarsTool { ctx: ctx.clone() }));
    manager.register(Arc::new(ListEventsTool { ctx: ctx.clone() }));
    manager.register(Arc::new(CreateEventTool { ctx: ctx.clone() }));
    manager.register(Arc::new(DeleteEventTool { ctx: ctx.clone() }));
    manager.register(Arc::new(SyncCalendarTool { ctx }));
}

/// List all cached calendars
pub struct ListCalendarsTool {
    ctx: Arc<CalendarContext>,
}

#[async_trait]
impl Tool for ListCalendarsTool {
    fn name(&self) -> &str {
        "list_calendars"
    }

    fn description(&self) -> &str {
        "List all available calendars"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _input: Value) -> cal_core::Result<ToolResult> {
        let engine = match self.ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        match engine.list_calendars().await {
            Ok(calendars) => {
                let items: Vec<Value> = calendars
                    .iter()
                    .map(|c| json!({"id": c.id, "name": c.name, "url": c.url}))
                    .collect();
                Ok(ToolResult::success(
                    serde_json::to_string(&items).unwrap_or_default(),
                ))
            }
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// List cached events within a date range
pub struct ListEventsTool {
    ctx: Arc<CalendarContext>,
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        "list_events"
    }

    fn description(&self) -> &str {
        "List events within a date range"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "start_date": {
                    "type": "string",
                    "description": "Start date (ISO 8601, e.g. 2024-03-01T00:00:00)"
                },
                "end_date": {
                    "type": "string",
                    "description": "End date (ISO 8601)"
                },
                "calendar_name": {
                    "type": "string",
                    "description": "Optional calendar name to filter by"
                }
            },
            "required": ["start_date", "end_date"]
        })
    }

    async fn execute(&self, input: Value) -> cal_core::Result<ToolResult> {
        let start = required_datetime(&input, "start_date")?;
        let end = required_datetime(&input, "end_date")?;
        let calendar_name = input["calendar_name"].as_str();

        let engine = match self.ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        match engine.list_events(start, end, calendar_name).await {
            Ok(events) => {
                let items: Vec<Value> = events
                    .iter()
                    .map(|e| {
                        json!({
                            "uid": e.uid,
                            "summary": e.summary,
                            "description": e.description,
                            "start": e.start.format(OUT_FORMAT).to_string(),
                            "end": e.end.format(OUT_FORMAT).to_string(),
                            "location": e.location,
                            "calendar": e.calendar,
                        })
                    })
                    .collect();
                Ok(ToolResult::success(
                    serde_json::to_string(&items).unwrap_or_default(),
                ))
            }
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// Create an event on the remote server
pub struct CreateEventTool {
    ctx: Arc<CalendarContext>,
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "create_event"
    }

    fn description(&self) -> &str {
        "Create a new event"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "calendar_name": {
                    "type": "string",
                    "description": "Name of the calendar"
                },
                "summary": {
                    "type": "string",
                    "description": "Event title"
                },
                "start": {
                    "type": "string",
                    "description": "Start time (ISO 8601)"
                },
                "end": {
                    "type": "string",
                    "description": "End time (ISO 8601)"
                },
                "description": {
                    "type": "string",
                    "description": "Event description"
                },
                "location": {
                    "type": "string",
                    "description": "Event location"
                }
            },
            "required": ["calendar_name", "summary", "start", "end"]
        })
    }

    async fn execute(&self, input: Value) -> cal_core::Result<ToolResult> {
        let calendar_name = required_str(&input, "calendar_name")?;
        let draft = EventDraft {
            summary: required_str(&input, "summary")?.to_string(),
            description: input["description"].as_str().unwrap_or_default().to_string(),
            location: input["location"].as_str().unwrap_or_default().to_string(),
            start: required_datetime(&input, "start")?,
            end: required_datetime(&input, "end")?,
        };

        let engine = match self.ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        match engine.create_event(calendar_name, &draft).await {
            Ok(report) => Ok(ToolResult::success(
                serde_json::to_string(&json!({"status": "created", "synced": report}))
                    .unwrap_or_default(),
            )),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// Delete an event from the remote server by uid
pub struct DeleteEventTool {
    ctx: Arc<CalendarContext>,
}

#[async_trait]
impl Tool for DeleteEventTool {
    fn name(&self) -> &str {
        "delete_event"
    }

    fn description(&self) -> &str {
        "Delete an event by UID"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "calendar_name": {
                    "type": "string",
                    "description": "Name of the calendar"
                },
                "uid": {
                    "type": "string",
                    "description": "UID of the event to delete"
                }
            },
            "required": ["calendar_name", "uid"]
        })
    }

    async fn execute(&self, input: Value) -> cal_core::Result<ToolResult> {
        let calendar_name = required_str(&input, "calendar_name")?;
        let uid = required_str(&input, "uid")?;

        let engine = match self.ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        match engine.delete_event(calendar_name, uid).await {
            Ok(report) => Ok(ToolResult::success(
                serde_json::to_string(&json!({"status": "deleted", "synced": report}))
                    .unwrap_or_default(),
            )),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// Force a full sync against the remote server
pub struct SyncCalendarTool {
    ctx: Arc<CalendarContext>,
}

#[async_trait]
impl Tool for SyncCalendarTool {
    fn name(&self) -> &str {
        "sync_calendar"
    }

    fn description(&self) -> &str {
        "Force sync with the CalDAV server"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _input: Value) -> cal_core::Result<ToolResult> {
        let engine = match self.ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        match engine.sync().await {
            Ok(report) => Ok(ToolResult::success(
                serde_json::to_string(&report).unwrap_or_default(),
            )),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}
