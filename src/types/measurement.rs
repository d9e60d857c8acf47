//! The flat, self-contained measurement row every extract is made of.

use crate::types::error::NormalizeError;
use crate::types::location::Location;
use crate::types::raw::{RawDatetime, RawMeasurement};
use crate::types::sensor::Sensor;
use crate::types::timestamp::parse_utc;
use chrono::{DateTime, Utc};

/// One measurement with its location and sensor context copied in.
///
/// Each record embeds the context as it was when it was fetched, so a flushed
/// record can be read without any join. Every field taken from the measurement
/// payload is optional: absent in the payload means `None` here, never a default.
///
/// `sensor_id` and `location_id` always come from the [`Sensor`] and [`Location`]
/// the measurement was fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub parameter_name: Option<String>,
    pub parameter_id: Option<i64>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub period_from_utc: Option<DateTime<Utc>>,
    /// Local wall time exactly as delivered, offset included.
    pub period_from_local: Option<String>,
    pub period_to_utc: Option<DateTime<Utc>>,
    pub period_to_local: Option<String>,
    pub coverage_percent: Option<f64>,
    pub sensor_id: i64,
    pub location_id: i64,
    pub searched_locality: String,
    pub city_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
}

impl MeasurementRecord {
    /// Builds a record from a raw measurement and the context it was fetched under.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::InvertedPeriod`] when both period bounds are present
    /// and the start lies after the end. Such items are rejected, not reordered.
    pub fn from_raw(
        raw: &RawMeasurement,
        location: &Location,
        sensor: &Sensor,
    ) -> Result<Self, NormalizeError> {
        let parameter = raw.parameter.as_ref();
        let period = raw.period.as_ref();
        let from = period.and_then(|p| p.datetime_from.as_ref());
        let to = period.and_then(|p| p.datetime_to.as_ref());

        let period_from_utc = utc_of(from);
        let period_to_utc = utc_of(to);
        if let (Some(from), Some(to)) = (period_from_utc, period_to_utc) {
            if from > to {
                return Err(NormalizeError::InvertedPeriod {
                    sensor_id: sensor.id,
                    from,
                    to,
                });
            }
        }

        Ok(MeasurementRecord {
            parameter_name: parameter.and_then(|p| p.name.clone()),
            parameter_id: parameter.and_then(|p| p.id),
            value: raw.value,
            unit: parameter.and_then(|p| p.units.clone()),
            period_from_utc,
            period_from_local: from.and_then(|d| d.local.clone()),
            period_to_utc,
            period_to_local: to.and_then(|d| d.local.clone()),
            coverage_percent: raw.coverage.as_ref().and_then(|c| c.percent_complete),
            sensor_id: sensor.id,
            location_id: location.id,
            searched_locality: location.searched_locality.clone(),
            city_name: location.city_name.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            location_name: location.canonical_name.clone(),
        })
    }
}

fn utc_of(datetime: Option<&RawDatetime>) -> Option<DateTime<Utc>> {
    datetime.and_then(|d| d.utc.as_deref()).and_then(parse_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{location_json, measurement_json, sensor_json};
    use crate::types::raw::{RawLocation, RawSensor};
    use serde_json::json;

    fn context() -> (Location, Sensor) {
        let raw_location: RawLocation =
            serde_json::from_value(location_json(202, "Jardin JUNJI", "Puchuncavi", "CL")).unwrap();
        let location = Location::from_raw(&raw_location, "JUNJI");
        let raw_sensor: RawSensor = serde_json::from_value(sensor_json(7002, "pm25", "µg/m³")).unwrap();
        let sensor = Sensor::from_raw(&raw_sensor, location.id);
        (location, sensor)
    }

    #[test]
    fn record_embeds_location_and_sensor() {
        let (location, sensor) = context();
        let raw: RawMeasurement = serde_json::from_value(measurement_json(12.5, 4)).unwrap();

        let record = MeasurementRecord::from_raw(&raw, &location, &sensor).unwrap();

        assert_eq!(record.location_id, 202);
        assert_eq!(record.sensor_id, 7002);
        assert_eq!(record.searched_locality, "JUNJI");
        assert_eq!(record.city_name.as_deref(), Some("Puchuncavi"));
        assert_eq!(record.location_name.as_deref(), Some("Jardin JUNJI"));
        assert_eq!(record.value, Some(12.5));
        assert_eq!(record.unit.as_deref(), Some("µg/m³"));
        assert_eq!(record.coverage_percent, Some(100.0));
        assert_eq!(
            record.period_from_local.as_deref(),
            Some("2024-03-01T04:00:00-03:00")
        );
        assert!(record.period_from_utc < record.period_to_utc);
    }

    #[test]
    fn absent_fields_are_null_not_zero() {
        let (location, sensor) = context();
        let raw: RawMeasurement = serde_json::from_value(json!({})).unwrap();

        let record = MeasurementRecord::from_raw(&raw, &location, &sensor).unwrap();

        assert_eq!(record.value, None);
        assert_eq!(record.parameter_name, None);
        assert_eq!(record.parameter_id, None);
        assert_eq!(record.unit, None);
        assert_eq!(record.period_from_utc, None);
        assert_eq!(record.period_to_local, None);
        assert_eq!(record.coverage_percent, None);
        assert_eq!(record.sensor_id, sensor.id);
        assert_eq!(record.location_id, location.id);
    }

    #[test]
    fn inverted_period_is_rejected() {
        let (location, sensor) = context();
        let raw: RawMeasurement = serde_json::from_value(json!({
            "value": 3.0,
            "period": {
                "datetimeFrom": { "utc": "2024-03-01T05:00:00Z" },
                "datetimeTo": { "utc": "2024-03-01T04:00:00Z" }
            }
        }))
        .unwrap();

        let err = MeasurementRecord::from_raw(&raw, &location, &sensor).unwrap_err();
        assert!(matches!(err, NormalizeError::InvertedPeriod { sensor_id: 7002, .. }));
    }

    #[test]
    fn half_open_period_is_kept() {
        let (location, sensor) = context();
        let raw: RawMeasurement = serde_json::from_value(json!({
            "value": 3.0,
            "period": { "datetimeFrom": { "utc": "2024-03-01T05:00:00Z" } }
        }))
        .unwrap();

        let record = MeasurementRecord::from_raw(&raw, &location, &sensor).unwrap();
        assert!(record.period_from_utc.is_some());
        assert_eq!(record.period_to_utc, None);
    }
}
