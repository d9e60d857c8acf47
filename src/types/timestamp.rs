use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;

/// Parses a provider timestamp into UTC.
///
/// Accepts RFC 3339 with any offset, and offset-less `YYYY-MM-DDTHH:MM:SS` which is
/// taken to already be UTC. Anything else yields `None`.
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => Some(Utc.from_utc_datetime(&naive)),
        Err(_) => {
            debug!("Unparseable timestamp {:?}", value);
            None
        }
    }
}

/// RFC 3339 rendering used in every written table.
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
