//! Wire shapes of the provider's JSON payloads.
//!
//! Only the fields the pipeline reads are declared. Apart from identifiers every
//! field is optional, so a payload that drops or renames a field still parses and
//! the gap surfaces as a null further down.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDatetime {
    pub utc: Option<String>,
    pub local: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCountry {
    pub id: Option<i64>,
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawProvider {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCoordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One entry of the `locations` catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    pub id: i64,
    pub name: Option<String>,
    pub locality: Option<String>,
    pub timezone: Option<String>,
    pub country: Option<RawCountry>,
    pub provider: Option<RawProvider>,
    pub is_mobile: Option<bool>,
    pub is_monitor: Option<bool>,
    pub coordinates: Option<RawCoordinates>,
    pub datetime_first: Option<RawDatetime>,
    pub datetime_last: Option<RawDatetime>,
}

impl RawLocation {
    pub fn country_code(&self) -> Option<&str> {
        self.country.as_ref().and_then(|c| c.code.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParameter {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub units: Option<String>,
    pub display_name: Option<String>,
}

/// One entry of `locations/{id}/sensors`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSensor {
    pub id: i64,
    pub name: Option<String>,
    pub parameter: Option<RawParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPeriod {
    pub label: Option<String>,
    pub interval: Option<String>,
    pub datetime_from: Option<RawDatetime>,
    pub datetime_to: Option<RawDatetime>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoverage {
    pub percent_complete: Option<f64>,
    pub percent_coverage: Option<f64>,
}

/// One entry of `sensors/{id}/measurements`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMeasurement {
    pub value: Option<f64>,
    pub parameter: Option<RawParameter>,
    pub period: Option<RawPeriod>,
    pub coverage: Option<RawCoverage>,
}
