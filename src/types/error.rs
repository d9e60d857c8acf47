use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a raw measurement was refused at the normalization boundary.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("Measurement period for sensor {sensor_id} starts at {from} after it ends at {to}")]
    InvertedPeriod {
        sensor_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}
