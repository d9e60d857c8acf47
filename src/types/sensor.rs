use crate::types::raw::RawSensor;

/// A single parameter stream attached to a [`crate::Location`], referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: i64,
    pub location_id: i64,
    pub parameter_id: Option<i64>,
    /// Short parameter code, e.g. `pm25`.
    pub parameter_name: Option<String>,
    pub parameter_units: Option<String>,
    pub parameter_display_name: Option<String>,
}

impl Sensor {
    pub fn from_raw(raw: &RawSensor, location_id: i64) -> Self {
        let parameter = raw.parameter.as_ref();
        Sensor {
            id: raw.id,
            location_id,
            parameter_id: parameter.and_then(|p| p.id),
            parameter_name: parameter.and_then(|p| p.name.clone()),
            parameter_units: parameter.and_then(|p| p.units.clone()),
            parameter_display_name: parameter.and_then(|p| p.display_name.clone()),
        }
    }
}
