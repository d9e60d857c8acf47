//! Monitoring sites as the pipeline keeps them after resolution.

use crate::types::raw::RawLocation;
use crate::types::timestamp::parse_utc;
use chrono::{DateTime, Utc};

/// A provider monitoring site, tagged with the target locality that selected it.
///
/// The same provider id may appear under several `searched_locality` values when
/// a catalog entry matches more than one target. Those copies are kept as-is; they
/// signal an ambiguous name rather than a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Provider-assigned location id.
    pub id: i64,
    /// Display name in the provider catalog.
    pub canonical_name: Option<String>,
    /// The target string that caused this location to be kept.
    pub searched_locality: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: Option<String>,
    pub city_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA timezone name, e.g. `America/Santiago`.
    pub timezone: Option<String>,
    pub provider_name: Option<String>,
    pub is_monitor: Option<bool>,
    pub is_mobile: Option<bool>,
    /// First and last measurement the catalog knows of for this site.
    pub first_seen_utc: Option<DateTime<Utc>>,
    pub last_seen_utc: Option<DateTime<Utc>>,
}

impl Location {
    pub fn from_raw(raw: &RawLocation, searched_locality: &str) -> Self {
        let coordinates = raw.coordinates.as_ref();
        Location {
            id: raw.id,
            canonical_name: raw.name.clone(),
            searched_locality: searched_locality.to_string(),
            country_code: raw.country_code().map(str::to_string),
            city_name: raw.locality.clone(),
            latitude: coordinates.and_then(|c| c.latitude),
            longitude: coordinates.and_then(|c| c.longitude),
            timezone: raw.timezone.clone(),
            provider_name: raw.provider.as_ref().and_then(|p| p.name.clone()),
            is_monitor: raw.is_monitor,
            is_mobile: raw.is_mobile,
            first_seen_utc: raw
                .datetime_first
                .as_ref()
                .and_then(|d| d.utc.as_deref())
                .and_then(parse_utc),
            last_seen_utc: raw
                .datetime_last
                .as_ref()
                .and_then(|d| d.utc.as_deref())
                .and_then(parse_utc),
        }
    }

    /// Name used in log lines: the catalog name, or the id when the catalog has none.
    pub fn label(&self) -> String {
        match &self.canonical_name {
            Some(name) => format!("{} ({})", name, self.id),
            None => format!("location {}", self.id),
        }
    }
}
