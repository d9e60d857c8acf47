//! Derived views over a finished record set.
//!
//! Everything here is computed from the records in memory. Nothing is fetched.

use crate::types::measurement::MeasurementRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Aggregate over the records sharing one grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    /// `None` groups the records where the key field is missing.
    pub key: Option<String>,
    pub records: usize,
    pub sensors: usize,
    pub locations: usize,
    pub value_min: Option<f64>,
    pub value_max: Option<f64>,
    pub value_mean: Option<f64>,
}

#[derive(Default)]
struct GroupAcc {
    records: usize,
    sensors: HashSet<i64>,
    locations: HashSet<i64>,
    sum: f64,
    values: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl GroupAcc {
    fn add(&mut self, record: &MeasurementRecord) {
        self.records += 1;
        self.sensors.insert(record.sensor_id);
        self.locations.insert(record.location_id);
        if let Some(value) = record.value.filter(|v| v.is_finite()) {
            self.sum += value;
            self.values += 1;
            self.min = Some(self.min.map_or(value, |m| m.min(value)));
            self.max = Some(self.max.map_or(value, |m| m.max(value)));
        }
    }

    fn finish(self, key: Option<String>) -> GroupSummary {
        GroupSummary {
            key,
            records: self.records,
            sensors: self.sensors.len(),
            locations: self.locations.len(),
            value_min: self.min,
            value_max: self.max,
            value_mean: (self.values > 0).then(|| self.sum / self.values as f64),
        }
    }
}

fn group_by<F>(records: &[MeasurementRecord], key: F) -> Vec<GroupSummary>
where
    F: Fn(&MeasurementRecord) -> Option<String>,
{
    let mut groups: BTreeMap<Option<String>, GroupAcc> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().add(record);
    }
    groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key))
        .collect()
}

/// Overview of a finalized export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub total_records: usize,
    pub sensor_count: usize,
    pub location_count: usize,
    pub locality_count: usize,
    pub earliest_period_utc: Option<DateTime<Utc>>,
    pub latest_period_utc: Option<DateTime<Utc>>,
    /// `(min, max)` over the records that carry coordinates.
    pub latitude_range: Option<(f64, f64)>,
    pub longitude_range: Option<(f64, f64)>,
    /// Records whose `(sensor_id, period_from_utc)` was already seen earlier in the set.
    pub duplicate_keys: usize,
    pub by_locality: Vec<GroupSummary>,
    pub by_parameter: Vec<GroupSummary>,
    pub by_city: Vec<GroupSummary>,
}

impl ExportSummary {
    pub fn from_records(records: &[MeasurementRecord]) -> Self {
        let sensors: HashSet<i64> = records.iter().map(|r| r.sensor_id).collect();
        let locations: HashSet<i64> = records.iter().map(|r| r.location_id).collect();
        let periods = records.iter().filter_map(|r| r.period_from_utc);

        let mut keys = HashSet::new();
        let duplicate_keys = records
            .iter()
            .filter_map(|r| r.period_from_utc.map(|from| (r.sensor_id, from)))
            .filter(|key| !keys.insert(*key))
            .count();

        let by_locality = group_by(records, |r| Some(r.searched_locality.clone()));
        ExportSummary {
            total_records: records.len(),
            sensor_count: sensors.len(),
            location_count: locations.len(),
            locality_count: by_locality.len(),
            earliest_period_utc: periods.clone().min(),
            latest_period_utc: periods.max(),
            latitude_range: bounds(records.iter().filter_map(|r| r.latitude)),
            longitude_range: bounds(records.iter().filter_map(|r| r.longitude)),
            duplicate_keys,
            by_locality,
            by_parameter: group_by(records, |r| r.parameter_name.clone()),
            by_city: group_by(records, |r| r.city_name.clone()),
        }
    }

    /// Record count per searched locality.
    pub fn locality_counts(&self) -> BTreeMap<String, usize> {
        self.by_locality
            .iter()
            .filter_map(|g| g.key.clone().map(|k| (k, g.records)))
            .collect()
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
