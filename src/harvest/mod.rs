pub mod failure;
pub mod measurement_collector;
pub mod sensor_enumerator;
