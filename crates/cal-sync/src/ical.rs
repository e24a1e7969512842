//! iCalendar event mapping
//!
//! Parses one raw calendar-object payload into structured event records.
//! A payload is a small container format: a VCALENDAR wrapping zero, one,
//! or several components, of which only VEVENTs are of interest here.
//! Each VEVENT is mapped independently so that one malformed component
//! never takes down its siblings.

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

use crate::time::RemoteTimestamp;

/// Per-component mapping failure
#[derive(Error, Debug)]
pub enum IcalError {
    #[error("VEVENT component has no UID")]
    MissingUid,

    #[error("VEVENT '{0}' has no DTSTART")]
    MissingStart(String),

    #[error("Unparseable timestamp '{0}'")]
    BadTimestamp(String),

    #[error("Unknown time zone '{0}'")]
    UnknownTimeZone(String),
}

/// One event extracted from a payload, times already canonical
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// One content line split into name, parameters, and value
struct Property {
    name: String,
    params: Vec<(String, String)>,
    value: String,
}

/// Parse every VEVENT component of a raw iCalendar payload
///
/// Returns one entry per component: `Ok` with the mapped event, or `Err`
/// when that single component is malformed (missing UID or DTSTART, or a
/// timestamp that cannot be interpreted). Non-event components are
/// skipped.
pub fn parse_events(payload: &str) -> Vec<std::result::Result<ParsedEvent, IcalError>> {
    let lines = unfold(payload);
    let mut results = Vec::new();

    let mut component_lines: Vec<Property> = Vec::new();
    let mut in_event = false;
    // VEVENTs may nest VALARM and friends; only event-level properties count
    let mut nested_depth = 0usize;

    for line in lines {
        let Some(prop) = parse_property(&line) else {
            continue;
        };

        match prop.name.as_str() {
            "BEGIN" if prop.value.eq_ignore_ascii_case("VEVENT") && !in_event => {
                in_event = true;
                component_lines.clear();
            }
            "BEGIN" if in_event => nested_depth += 1,
            "END" if prop.value.eq_ignore_ascii_case("VEVENT") && in_event && nested_depth == 0 => {
                in_event = false;
                results.push(map_component(&component_lines));
            }
            "END" if in_event && nested_depth > 0 => nested_depth -= 1,
            _ if in_event && nested_depth == 0 => component_lines.push(prop),
            _ => {}
        }
    }

    results
}

/// Map the properties of one VEVENT into a ParsedEvent
fn map_component(props: &[Property]) -> std::result::Result<ParsedEvent, IcalError> {
    let find = |name: &str| props.iter().find(|p| p.name == name);

    let uid = find("UID")
        .map(|p| p.value.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(IcalError::MissingUid)?;

    let text = |name: &str| {
        find(name)
            .map(|p| unescape_text(&p.value))
            .unwrap_or_default()
    };

    let start = find("DTSTART")
        .ok_or_else(|| IcalError::MissingStart(uid.clone()))
        .and_then(parse_timestamp)?
        .normalize();
    let end = match find("DTEND") {
        Some(p) => parse_timestamp(p)?.normalize(),
        None => start,
    };

    Ok(ParsedEvent {
        uid,
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        location: text("LOCATION"),
        start,
        end,
    })
}

/// Interpret a DTSTART/DTEND property as a remote timestamp
///
/// Four forms appear in practice: `...Z` UTC instants, instants qualified
/// by a `TZID=` parameter, floating local instants, and bare dates
/// (`VALUE=DATE`, the all-day marker).
fn parse_timestamp(prop: &Property) -> std::result::Result<RemoteTimestamp, IcalError> {
    let raw = prop.value.trim();
    let bad = || IcalError::BadTimestamp(raw.to_string());

    let is_date_value = prop
        .params
        .iter()
        .any(|(k, v)| k == "VALUE" && v.eq_ignore_ascii_case("DATE"));

    if is_date_value || !raw.contains('T') {
        let date = NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|_| bad())?;
        return Ok(RemoteTimestamp::Date(date));
    }

    if let Some(stripped) = raw.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
        return Ok(RemoteTimestamp::Zoned(naive.and_utc().fixed_offset()));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S").map_err(|_| bad())?;

    match prop.params.iter().find(|(k, _)| k == "TZID") {
        Some((_, tzid)) => {
            let tz: Tz = tzid
                .parse()
                .map_err(|_| IcalError::UnknownTimeZone(tzid.clone()))?;
            let zoned = tz
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(bad)?;
            Ok(RemoteTimestamp::Zoned(zoned.fixed_offset()))
        }
        None => Ok(RemoteTimestamp::Floating(naive)),
    }
}

/// Undo RFC 5545 line folding
fn unfold(payload: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for raw in payload.lines() {
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.trim_end_matches('\r').to_string());
    }

    lines
}

/// Split a content line into name, parameters, and value
///
/// The value separator is the first `:` outside of double quotes.
fn parse_property(line: &str) -> Option<Property> {
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }

    let idx = split_at?;
    let (head, value) = (&line[..idx], &line[idx + 1..]);

    let mut parts = head.split(';');
    let name = parts.next()?.trim().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }

    let params = parts
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((
                k.trim().to_ascii_uppercase(),
                v.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();

    Some(Property {
        name,
        params,
        value: value.to_string(),
    })
}

/// Undo iCalendar text escaping
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn wrap(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{}END:VCALENDAR\r\n", body)
    }

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_single_event() {
        let payload = wrap(
            "BEGIN:VEVENT\r\n\
             UID:abc-123\r\n\
             SUMMARY:Standup\r\n\
             DESCRIPTION:Daily sync\r\n\
             LOCATION:Room 1\r\n\
             DTSTART:20240301T090000Z\r\n\
             DTEND:20240301T091500Z\r\n\
             END:VEVENT\r\n",
        );

        let events = parse_events(&payload);
        assert_eq!(events.len(), 1);
        let ev = events[0].as_ref().unwrap();
        assert_eq!(ev.uid, "abc-123");
        assert_eq!(ev.summary, "Standup");
        assert_eq!(ev.description, "Daily sync");
        assert_eq!(ev.location, "Room 1");
        assert_eq!(ev.start, ts(2024, 3, 1, 9, 0));
        assert_eq!(ev.end, ts(2024, 3, 1, 9, 15));
    }

    #[test]
    fn test_multiple_events_in_one_payload() {
        let payload = wrap(
            "BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240301T090000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:b\r\nDTSTART:20240302T090000Z\r\nEND:VEVENT\r\n",
        );

        let events = parse_events(&payload);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[test]
    fn test_missing_uid_isolated() {
        let payload = wrap(
            "BEGIN:VEVENT\r\nUID:good-1\r\nDTSTART:20240301T090000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nSUMMARY:No uid here\r\nDTSTART:20240301T090000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:good-2\r\nDTSTART:20240302T090000Z\r\nEND:VEVENT\r\n",
        );

        let events = parse_events(&payload);
        assert_eq!(events.len(), 3);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(IcalError::MissingUid)));
        assert!(events[2].is_ok());
    }

    #[test]
    fn test_missing_dtstart_is_error() {
        let payload = wrap("BEGIN:VEVENT\r\nUID:x\r\nSUMMARY:No start\r\nEND:VEVENT\r\n");
        let events = parse_events(&payload);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Err(IcalError::MissingStart(uid)) if uid == "x"));
    }

    #[test]
    fn test_end_defaults_to_start() {
        let payload = wrap("BEGIN:VEVENT\r\nUID:x\r\nDTSTART:20240301T090000Z\r\nEND:VEVENT\r\n");
        let ev = parse_events(&payload)[0].as_ref().unwrap().clone();
        assert_eq!(ev.end, ev.start);
        assert_eq!(ev.summary, "");
    }

    #[test]
    fn test_all_day_event() {
        let payload = wrap(
            "BEGIN:VEVENT\r\nUID:x\r\nDTSTART;VALUE=DATE:20240301\r\n\
             DTEND;VALUE=DATE:20240302\r\nEND:VEVENT\r\n",
        );
        let ev = parse_events(&payload)[0].as_ref().unwrap().clone();
        assert_eq!(ev.start, ts(2024, 3, 1, 0, 0));
        assert_eq!(ev.end, ts(2024, 3, 2, 0, 0));
    }

    #[test]
    fn test_tzid_converts_to_utc() {
        // America/New_York is UTC-5 on this date
        let payload = wrap(
            "BEGIN:VEVENT\r\nUID:x\r\n\
             DTSTART;TZID=America/New_York:20240301T090000\r\nEND:VEVENT\r\n",
        );
        let ev = parse_events(&payload)[0].as_ref().unwrap().clone();
        assert_eq!(ev.start, ts(2024, 3, 1, 14, 0));
    }

    #[test]
    fn test_unknown_tzid_is_error() {
        let payload = wrap(
            "BEGIN:VEVENT\r\nUID:x\r\n\
             DTSTART;TZID=Nowhere/Invalid:20240301T090000\r\nEND:VEVENT\r\n",
        );
        assert!(matches!(
            &parse_events(&payload)[0],
            Err(IcalError::UnknownTimeZone(tz)) if tz == "Nowhere/Invalid"
        ));
    }

    #[test]
    fn test_floating_time_passes_through() {
        let payload = wrap("BEGIN:VEVENT\r\nUID:x\r\nDTSTART:20240301T093000\r\nEND:VEVENT\r\n");
        let ev = parse_events(&payload)[0].as_ref().unwrap().clone();
        assert_eq!(ev.start, ts(2024, 3, 1, 9, 30));
    }

    #[test]
    fn test_folded_lines_and_escapes() {
        let payload = wrap(
            "BEGIN:VEVENT\r\n\
             UID:x\r\n\
             SUMMARY:Planning\r\n  session\r\n\
             DESCRIPTION:Agenda\\, part one\\nAgenda\\, part two\r\n\
             DTSTART:20240301T090000Z\r\n\
             END:VEVENT\r\n",
        );
        let ev = parse_events(&payload)[0].as_ref().unwrap().clone();
        assert_eq!(ev.summary, "Planning session");
        assert_eq!(ev.description, "Agenda, part one\nAgenda, part two");
    }

    #[test]
    fn test_non_event_components_skipped() {
        let payload = wrap(
            "BEGIN:VTIMEZONE\r\nTZID:Europe/Berlin\r\nEND:VTIMEZONE\r\n\
             BEGIN:VEVENT\r\nUID:x\r\nDTSTART:20240301T090000Z\r\n\
             BEGIN:VALARM\r\nTRIGGER:-PT10M\r\nEND:VALARM\r\n\
             END:VEVENT\r\n",
        );
        let events = parse_events(&payload);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_events(&wrap("")).is_empty());
    }

    #[test]
    fn test_bad_timestamp_is_error() {
        let payload = wrap("BEGIN:VEVENT\r\nUID:x\r\nDTSTART:not-a-time-T\r\nEND:VEVENT\r\n");
        assert!(matches!(&parse_events(&payload)[0], Err(IcalError::BadTimestamp(_))));
    }
}
