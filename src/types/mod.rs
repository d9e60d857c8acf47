pub mod error;
pub mod location;
pub mod measurement;
pub mod raw;
pub mod sensor;
pub mod timestamp;
