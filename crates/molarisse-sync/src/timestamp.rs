// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp normalization.
//!
//! The server emits instants in several encodings depending on the endpoint
//! and serializer version. Everything is reduced to a `DateTime<Utc>` with
//! whole-second precision:
//!
//! - ISO-8601 without a zone is read as UTC; with `Z` or an offset it is
//!   honoured.
//! - `YYYY-MM-DD HH:MM:SS[.ffffff]` is read field by field as local wall-clock
//!   time. A generic parser would guess the zone, which mis-locates it.
//! - `[year, month, day, hour?, minute?, second?, nanos?]` is also local
//!   wall-clock time; `month` is 1-based.
//! - Epoch numbers are milliseconds.
//!
//! Nothing here fails: an unusable value becomes "now" and is logged.

use std::sync::LazyLock;

use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound,
    TimeZone, Utc,
};
use molarisse_core::RawTimestamp;
use regex::Regex;
use tracing::warn;

static WALL_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2}) (\d{2}):(\d{2}):(\d{2})(?:\.(\d*))?$")
        .expect("wall clock pattern is valid")
});

const NAIVE_ISO_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Normalize any server encoding. Unparseable input becomes the current time.
pub fn normalize(raw: &RawTimestamp) -> DateTime<Utc> {
    match try_normalize(raw) {
        Some(instant) => instant,
        None => {
            warn!(raw = ?raw, "unparseable timestamp, substituting current time");
            now()
        }
    }
}

/// Like [`normalize`] for a field the server may omit.
pub fn normalize_or_now(raw: Option<&RawTimestamp>) -> DateTime<Utc> {
    match raw {
        Some(raw) => normalize(raw),
        None => {
            warn!("missing timestamp, substituting current time");
            now()
        }
    }
}

/// Read receipts are optional: anything unusable means "not read yet".
pub fn normalize_read_at(raw: Option<&RawTimestamp>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    let parsed = try_normalize(raw);
    if parsed.is_none() && !is_blank(raw) {
        warn!(raw = ?raw, "unparseable read timestamp, treating message as unread");
    }
    parsed
}

/// Parse without falling back.
pub fn try_normalize(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    let instant = match raw {
        RawTimestamp::Instant(instant) => Some(*instant),
        RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
        RawTimestamp::Parts(parts) => from_parts(parts),
        RawTimestamp::Text(text) => from_text(text),
        RawTimestamp::Other(_) => None,
    };
    instant.map(|t| t.trunc_subsecs(0))
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn is_blank(raw: &RawTimestamp) -> bool {
    match raw {
        RawTimestamp::Text(text) => text.trim().is_empty(),
        RawTimestamp::Other(value) => value.is_null(),
        _ => false,
    }
}

fn from_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = WALL_CLOCK.captures(text) {
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
        let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?;
        let time = NaiveTime::from_hms_opt(field(4)?, field(5)?, field(6)?)?;
        return local_to_utc(date.and_time(time));
    }

    if let Ok(with_zone) = DateTime::parse_from_rfc3339(text) {
        return Some(with_zone.with_timezone(&Utc));
    }

    // No zone marker: the server stores UTC.
    for format in NAIVE_ISO_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

fn from_parts(parts: &[i64]) -> Option<DateTime<Utc>> {
    if parts.len() < 3 {
        return None;
    }
    let component = |i: usize| -> Option<u32> {
        match parts.get(i) {
            Some(v) => u32::try_from(*v).ok(),
            None => Some(0),
        }
    };
    let year = i32::try_from(parts[0]).ok()?;
    let date = NaiveDate::from_ymd_opt(year, component(1)?, component(2)?)?;
    let time = NaiveTime::from_hms_opt(component(3)?, component(4)?, component(5)?)?;
    local_to_utc(date.and_time(time))
}

/// Resolve a local wall-clock reading. Ambiguous readings (clocks going back)
/// take the earlier instant; readings inside a spring-forward gap move one
/// hour ahead.
fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    let local = match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => Local
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }?;
    Some(local.with_timezone(&Utc))
}

/// Local wall-clock text in the `YYYY-MM-DD HH:MM:SS.ffffff` form.
pub fn to_wall_clock_text(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

/// Local wall-clock components with a 1-based month.
pub fn to_parts(instant: DateTime<Utc>) -> Vec<i64> {
    use chrono::{Datelike, Timelike};

    let local = instant.with_timezone(&Local);
    vec![
        i64::from(local.year()),
        i64::from(local.month()),
        i64::from(local.day()),
        i64::from(local.hour()),
        i64::from(local.minute()),
        i64::from(local.second()),
    ]
}

/// UTC ISO-8601 text without a zone marker, as the server's JSON mapper emits.
pub fn to_naive_iso(instant: DateTime<Utc>) -> String {
    instant.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()
}
