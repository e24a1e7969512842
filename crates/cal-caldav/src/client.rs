//! CalDAV client implementation
//!
//! Speaks the minimal CalDAV subset the gateway needs: PROPFIND to
//! enumerate calendar collections, REPORT to pull raw iCalendar
//! payloads, and PUT/DELETE on `{calendar}/{uid}.ics` for writes.

use chrono::{NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, error, info};

use cal_sync::{EventDraft, RemoteCalendar};

use crate::error::{CaldavError, Result};

/// CalDAV client for calendar operations
pub struct CaldavClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl CaldavClient {
    /// Create a new CalDAV client
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| CaldavError::Configuration(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!("CalDAV client initialized for: {}", base_url);

        Ok(Self {
            client,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Enumerate the calendar collections under the base URL
    pub async fn discover_calendars(&self) -> Result<Vec<RemoteCalendar>> {
        let url = format!("{}/", self.base_url);

        let body = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop>
        <D:displayname/>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

        debug!("Discovering calendars at: {}", url);

        let response = self
            .client
            .request(method("PROPFIND"), &url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", "1")
            .body(body)
            .send()
            .await
            .map_err(|e| CaldavError::Connection(e.to_string()))?;

        let text = self.read_body(response, "PROPFIND").await?;
        let mut calendars = parse_calendar_collections(&text)?;
        for calendar in &mut calendars {
            calendar.url = self.absolutize(&calendar.url);
        }

        info!("Discovered {} calendars", calendars.len());
        Ok(calendars)
    }

    /// Fetch the raw iCalendar payload of every event object in a calendar
    pub async fn fetch_objects(&self, calendar_url: &str) -> Result<Vec<String>> {
        let body = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop>
        <D:getetag/>
        <C:calendar-data/>
    </D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT"/>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#;

        debug!("Fetching events from: {}", calendar_url);

        let response = self
            .client
            .request(method("REPORT"), calendar_url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", "1")
            .body(body)
            .send()
            .await
            .map_err(|e| CaldavError::Connection(e.to_string()))?;

        let text = self.read_body(response, "REPORT").await?;
        let payloads = parse_event_payloads(&text)?;

        debug!("Fetched {} event objects", payloads.len());
        Ok(payloads)
    }

    /// Create an event object in a calendar
    pub async fn put_event(&self, calendar_url: &str, draft: &EventDraft) -> Result<()> {
        let uid = uuid::Uuid::new_v4().to_string();
        let url = object_url(calendar_url, &uid);
        let ical = event_to_ical(draft, &uid);

        debug!("Creating event '{}' at {}", draft.summary, url);

        let response = self
            .client
            .request(Method::PUT, &url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "text/calendar; charset=utf-8")
            .header("If-None-Match", "*")
            .body(ical)
            .send()
            .await
            .map_err(|e| CaldavError::Connection(e.to_string()))?;

        self.read_body(response, "PUT").await?;
        info!("Created event: {}", uid);
        Ok(())
    }

    /// Delete an event object from a calendar by uid
    pub async fn delete_object(&self, calendar_url: &str, uid: &str) -> Result<()> {
        let url = object_url(calendar_url, uid);

        debug!("Deleting event at {}", url);

        let response = self
            .client
            .request(Method::DELETE, &url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| CaldavError::Connection(e.to_string()))?;

        self.read_body(response, "DELETE").await?;
        info!("Deleted event: {}", uid);
        Ok(())
    }

    /// Check the status and drain the response body
    async fn read_body(&self, response: reqwest::Response, context: &str) -> Result<String> {
        let status = response.status();
        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|e| CaldavError::Connection(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        error!("{} request failed: {} - {}", context, status, body);
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CaldavError::Authentication(format!("{} returned {}", context, status))
            }
            StatusCode::NOT_FOUND => CaldavError::NotFound(format!("{} returned 404", context)),
            _ => CaldavError::Caldav(format!("{} failed: {} - {}", context, status, body)),
        })
    }

    /// Resolve a multistatus href (usually server-relative) to a full URL
    fn absolutize(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        format!("{}{}", server_origin(&self.base_url), href)
    }
}

#[async_trait::async_trait]
impl cal_sync::RemoteSource for CaldavClient {
    async fn list_calendars(&self) -> std::result::Result<Vec<RemoteCalendar>, cal_sync::RemoteError> {
        self.discover_calendars().await.map_err(to_remote_error)
    }

    async fn list_events(
        &self,
        calendar_url: &str,
    ) -> std::result::Result<Vec<String>, cal_sync::RemoteError> {
        self.fetch_objects(calendar_url).await.map_err(to_remote_error)
    }

    async fn create_event(
        &self,
        calendar_url: &str,
        draft: &EventDraft,
    ) -> std::result::Result<(), cal_sync::RemoteError> {
        self.put_event(calendar_url, draft).await.map_err(to_remote_error)
    }

    async fn delete_event(
        &self,
        calendar_url: &str,
        uid: &str,
    ) -> std::result::Result<(), cal_sync::RemoteError> {
        self.delete_object(calendar_url, uid).await.map_err(to_remote_error)
    }
}

fn to_remote_error(e: CaldavError) -> cal_sync::RemoteError {
    match e {
        CaldavError::Authentication(m) => cal_sync::RemoteError::Auth(m),
        CaldavError::NotFound(m) => cal_sync::RemoteError::NotFound(m),
        other => cal_sync::RemoteError::Transport(other.to_string()),
    }
}

fn method(name: &str) -> Method {
    // The byte strings are valid method tokens, so this cannot fail
    Method::from_bytes(name.as_bytes()).unwrap_or(Method::GET)
}

/// Extract `scheme://host[:port]` from a URL
fn server_origin(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(pos) => pos + 3,
        None => return url,
    };
    match url[after_scheme..].find('/') {
        Some(pos) => &url[..after_scheme + pos],
        None => url,
    }
}

fn object_url(calendar_url: &str, uid: &str) -> String {
    format!("{}/{}.ics", calendar_url.trim_end_matches('/'), uid)
}

/// Parse a PROPFIND multistatus into the calendar collections it lists
///
/// A response counts as a calendar when its resourcetype carries a
/// `calendar` element; the collection itself and non-calendar children
/// are skipped. Namespace prefixes vary by server, so elements are
/// matched on local name.
fn parse_calendar_collections(response: &str) -> Result<Vec<RemoteCalendar>> {
    let mut calendars = Vec::new();
    let mut reader = Reader::from_str(response);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut href = String::new();
    let mut displayname: Option<String> = None;
    let mut is_calendar = false;
    let mut in_href = false;
    let mut in_displayname = false;
    let mut in_resourcetype = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"response" => {
                    href.clear();
                    displayname = None;
                    is_calendar = false;
                }
                b"href" => in_href = true,
                b"displayname" => in_displayname = true,
                b"resourcetype" => in_resourcetype = true,
                b"calendar" if in_resourcetype => is_calendar = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if in_resourcetype && e.local_name().as_ref() == b"calendar" {
                    is_calendar = true;
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"response" => {
                    if is_calendar && !href.is_empty() {
                        calendars.push(RemoteCalendar {
                            name: displayname.take().filter(|n| !n.is_empty()),
                            url: href.trim().to_string(),
                        });
                    }
                }
                b"href" => in_href = false,
                b"displayname" => in_displayname = false,
                b"resourcetype" => in_resourcetype = false,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_href {
                    href.push_str(&text);
                } else if in_displayname {
                    displayname.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CaldavError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(calendars)
}

/// Parse a REPORT multistatus into the raw calendar-data payloads
fn parse_event_payloads(response: &str) -> Result<Vec<String>> {
    let mut payloads = Vec::new();
    let mut reader = Reader::from_str(response);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut in_calendar_data = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"calendar-data" => {
                in_calendar_data = true;
                current.clear();
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"calendar-data" => {
                in_calendar_data = false;
                if !current.trim().is_empty() {
                    payloads.push(current.clone());
                }
            }
            Ok(Event::Text(ref e)) if in_calendar_data => {
                current.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::CData(ref e)) if in_calendar_data => {
                current.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CaldavError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(payloads)
}

/// Serialize an event draft as a single-event VCALENDAR object
///
/// Times are written as floating local timestamps, matching the form
/// the gateway accepted them in.
fn event_to_ical(draft: &EventDraft, uid: &str) -> String {
    let mut ical = String::new();

    ical.push_str("BEGIN:VCALENDAR\r\n");
    ical.push_str("VERSION:2.0\r\n");
    ical.push_str("PRODID:-//cal-gateway//calendar//EN\r\n");
    ical.push_str("CALSCALE:GREGORIAN\r\n");
    ical.push_str("BEGIN:VEVENT\r\n");

    ical.push_str(&format!("UID:{}\r\n", uid));
    ical.push_str(&format!(
        "DTSTAMP:{}\r\n",
        Utc::now().format("%Y%m%dT%H%M%SZ")
    ));
    ical.push_str(&format!("DTSTART:{}\r\n", format_ical_time(draft.start)));
    ical.push_str(&format!("DTEND:{}\r\n", format_ical_time(draft.end)));
    ical.push_str(&format!("SUMMARY:{}\r\n", escape_text(&draft.summary)));

    if !draft.description.is_empty() {
        ical.push_str(&format!(
            "DESCRIPTION:{}\r\n",
            escape_text(&draft.description)
        ));
    }
    if !draft.location.is_empty() {
        ical.push_str(&format!("LOCATION:{}\r\n", escape_text(&draft.location)));
    }

    ical.push_str("END:VEVENT\r\n");
    ical.push_str("END:VCALENDAR\r\n");

    ical
}

fn format_ical_time(dt: NaiveDateTime) -> String {
    dt.format("%Y%m%dT%H%M%S").to_string()
}

/// Escape TEXT property values per RFC 5545 section 3.3.11
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
