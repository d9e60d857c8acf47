mod checkpoint;
mod config;
mod error;
mod harvest;
mod harvester;
mod pagination;
mod resolver;
mod run_state;
mod transport;
mod types;
mod utils;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, HarvestConfig, DEFAULT_BASE_URL};
pub use error::HarvestError;
pub use harvester::{HarvestReport, Harvester};
pub use run_state::{RunPhase, RunStateMachine};

pub use transport::backend::{HttpBackend, HttpReply, ReqwestBackend};
pub use transport::error::{BackendError, TransportError};
pub use transport::retry::{ResourceKind, RetryPolicy, ThrottleConfig};
pub use transport::throttled::{ApiResponse, ThrottledTransport};

pub use pagination::page::Page;
pub use pagination::reader::{Cursor, PageRequest, ResourceReader};

pub use resolver::location_resolver::{CatalogScope, LocationResolver};
pub use resolver::resolution::Resolution;

pub use harvest::failure::{Failure, FailureStage};
pub use harvest::measurement_collector::{MeasurementCollector, SensorMeasurements};
pub use harvest::sensor_enumerator::{Enumeration, LocationSensors, SensorEnumerator};

pub use checkpoint::error::CheckpointError;
pub use checkpoint::summary::{ExportSummary, GroupSummary};
pub use checkpoint::writer::{read_extract, CheckpointWriter, ExportPaths, ExportReport};

pub use types::error::NormalizeError;
pub use types::location::Location;
pub use types::measurement::MeasurementRecord;
pub use types::raw::{
    RawCoordinates, RawCountry, RawCoverage, RawDatetime, RawLocation, RawMeasurement,
    RawParameter, RawPeriod, RawProvider, RawSensor,
};
pub use types::sensor::Sensor;
pub use utils::default_output_dir;
