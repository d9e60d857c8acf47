pub mod location_resolver;
pub mod resolution;
