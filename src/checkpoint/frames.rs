//! Tables written by the checkpoint writer.
//!
//! Column sets are fixed. New columns may only ever be appended so older readers
//! of the extracts keep working.

use crate::checkpoint::summary::{ExportSummary, GroupSummary};
use crate::harvest::sensor_enumerator::LocationSensors;
use crate::types::measurement::MeasurementRecord;
use crate::types::timestamp::format_utc;
use chrono::{DateTime, Utc};
use polars::prelude::*;

/// Column order of the record extract.
pub const RECORD_COLUMNS: [&str; 16] = [
    "parameter_name",
    "parameter_id",
    "value",
    "unit",
    "period_from_utc",
    "period_from_local",
    "period_to_utc",
    "period_to_local",
    "coverage_percent",
    "sensor_id",
    "location_id",
    "searched_locality",
    "city_name",
    "latitude",
    "longitude",
    "location_name",
];

fn utc_strings(values: impl Iterator<Item = Option<DateTime<Utc>>>) -> Vec<Option<String>> {
    values.map(|v| v.as_ref().map(format_utc)).collect()
}

pub fn records_frame(records: &[MeasurementRecord]) -> PolarsResult<DataFrame> {
    df!(
        "parameter_name" => records.iter().map(|r| r.parameter_name.clone()).collect::<Vec<_>>(),
        "parameter_id" => records.iter().map(|r| r.parameter_id).collect::<Vec<_>>(),
        "value" => records.iter().map(|r| r.value).collect::<Vec<_>>(),
        "unit" => records.iter().map(|r| r.unit.clone()).collect::<Vec<_>>(),
        "period_from_utc" => utc_strings(records.iter().map(|r| r.period_from_utc)),
        "period_from_local" => records.iter().map(|r| r.period_from_local.clone()).collect::<Vec<_>>(),
        "period_to_utc" => utc_strings(records.iter().map(|r| r.period_to_utc)),
        "period_to_local" => records.iter().map(|r| r.period_to_local.clone()).collect::<Vec<_>>(),
        "coverage_percent" => records.iter().map(|r| r.coverage_percent).collect::<Vec<_>>(),
        "sensor_id" => records.iter().map(|r| r.sensor_id).collect::<Vec<_>>(),
        "location_id" => records.iter().map(|r| r.location_id).collect::<Vec<_>>(),
        "searched_locality" => records.iter().map(|r| r.searched_locality.clone()).collect::<Vec<_>>(),
        "city_name" => records.iter().map(|r| r.city_name.clone()).collect::<Vec<_>>(),
        "latitude" => records.iter().map(|r| r.latitude).collect::<Vec<_>>(),
        "longitude" => records.iter().map(|r| r.longitude).collect::<Vec<_>>(),
        "location_name" => records.iter().map(|r| r.location_name.clone()).collect::<Vec<_>>(),
    )?
    .select(RECORD_COLUMNS)
}

/// One row per (location, sensor). A location without sensors still gets a row,
/// with the sensor columns null.
pub fn metadata_frame(catalog: &[LocationSensors]) -> PolarsResult<DataFrame> {
    let rows: Vec<_> = catalog
        .iter()
        .flat_map(|entry| {
            let location = &entry.location;
            let sensors: Vec<Option<&_>> = if entry.sensors.is_empty() {
                vec![None]
            } else {
                entry.sensors.iter().map(Some).collect()
            };
            sensors.into_iter().map(move |sensor| (location, sensor))
        })
        .collect();

    df!(
        "searched_locality" => rows.iter().map(|(l, _)| l.searched_locality.clone()).collect::<Vec<_>>(),
        "location_id" => rows.iter().map(|(l, _)| l.id).collect::<Vec<_>>(),
        "location_name" => rows.iter().map(|(l, _)| l.canonical_name.clone()).collect::<Vec<_>>(),
        "country_code" => rows.iter().map(|(l, _)| l.country_code.clone()).collect::<Vec<_>>(),
        "city_name" => rows.iter().map(|(l, _)| l.city_name.clone()).collect::<Vec<_>>(),
        "latitude" => rows.iter().map(|(l, _)| l.latitude).collect::<Vec<_>>(),
        "longitude" => rows.iter().map(|(l, _)| l.longitude).collect::<Vec<_>>(),
        "timezone" => rows.iter().map(|(l, _)| l.timezone.clone()).collect::<Vec<_>>(),
        "provider_name" => rows.iter().map(|(l, _)| l.provider_name.clone()).collect::<Vec<_>>(),
        "is_monitor" => rows.iter().map(|(l, _)| l.is_monitor).collect::<Vec<_>>(),
        "is_mobile" => rows.iter().map(|(l, _)| l.is_mobile).collect::<Vec<_>>(),
        "first_seen_utc" => utc_strings(rows.iter().map(|(l, _)| l.first_seen_utc)),
        "last_seen_utc" => utc_strings(rows.iter().map(|(l, _)| l.last_seen_utc)),
        "sensor_id" => rows.iter().map(|(_, s)| s.map(|s| s.id)).collect::<Vec<_>>(),
        "parameter_id" => rows.iter().map(|(_, s)| s.and_then(|s| s.parameter_id)).collect::<Vec<_>>(),
        "parameter_name" => rows.iter().map(|(_, s)| s.and_then(|s| s.parameter_name.clone())).collect::<Vec<_>>(),
        "parameter_units" => rows.iter().map(|(_, s)| s.and_then(|s| s.parameter_units.clone())).collect::<Vec<_>>(),
        "parameter_display_name" => rows.iter().map(|(_, s)| s.and_then(|s| s.parameter_display_name.clone())).collect::<Vec<_>>(),
    )
}

/// A grouped summary, keyed by the column `key_column`.
pub fn groups_frame(groups: &[GroupSummary], key_column: &str) -> PolarsResult<DataFrame> {
    df!(
        key_column => groups.iter().map(|g| g.key.clone()).collect::<Vec<_>>(),
        "records" => groups.iter().map(|g| g.records as u64).collect::<Vec<_>>(),
        "sensors" => groups.iter().map(|g| g.sensors as u64).collect::<Vec<_>>(),
        "locations" => groups.iter().map(|g| g.locations as u64).collect::<Vec<_>>(),
        "value_min" => groups.iter().map(|g| g.value_min).collect::<Vec<_>>(),
        "value_max" => groups.iter().map(|g| g.value_max).collect::<Vec<_>>(),
        "value_mean" => groups.iter().map(|g| g.value_mean).collect::<Vec<_>>(),
    )
}

/// The overview as `metric,value` rows.
pub fn overview_frame(summary: &ExportSummary) -> PolarsResult<DataFrame> {
    let lat = summary.latitude_range;
    let lon = summary.longitude_range;
    let rows: Vec<(&str, Option<String>)> = vec![
        ("total_records", Some(summary.total_records.to_string())),
        ("sensors", Some(summary.sensor_count.to_string())),
        ("locations", Some(summary.location_count.to_string())),
        ("localities", Some(summary.locality_count.to_string())),
        ("earliest_period_from_utc", summary.earliest_period_utc.as_ref().map(format_utc)),
        ("latest_period_from_utc", summary.latest_period_utc.as_ref().map(format_utc)),
        ("latitude_min", lat.map(|(lo, _)| lo.to_string())),
        ("latitude_max", lat.map(|(_, hi)| hi.to_string())),
        ("longitude_min", lon.map(|(lo, _)| lo.to_string())),
        ("longitude_max", lon.map(|(_, hi)| hi.to_string())),
        ("duplicate_sensor_period_keys", Some(summary.duplicate_keys.to_string())),
    ];
    df!(
        "metric" => rows.iter().map(|(m, _)| m.to_string()).collect::<Vec<_>>(),
        "value" => rows.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>(),
    )
}
