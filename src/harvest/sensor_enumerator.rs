use crate::harvest::failure::{Failure, FailureStage};
use crate::pagination::reader::{Cursor, PageRequest, ResourceReader};
use crate::transport::backend::HttpBackend;
use crate::transport::error::TransportError;
use crate::transport::retry::ResourceKind;
use crate::transport::throttled::ThrottledTransport;
use crate::types::location::Location;
use crate::types::raw::RawSensor;
use crate::types::sensor::Sensor;
use futures_util::TryStreamExt;
use log::{info, warn};
use std::collections::HashMap;

/// A location together with the sensors it exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSensors {
    pub location: Location,
    pub sensors: Vec<Sensor>,
}

/// Result of enumerating many locations. Failed locations are absent from
/// `per_location` and listed in `failures`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enumeration {
    pub per_location: Vec<LocationSensors>,
    pub failures: Vec<Failure>,
}

impl Enumeration {
    pub fn sensor_count(&self) -> usize {
        self.per_location.iter().map(|l| l.sensors.len()).sum()
    }
}

pub struct SensorEnumerator<'a, B> {
    reader: ResourceReader<'a, B>,
    page_size: usize,
}

impl<'a, B: HttpBackend> SensorEnumerator<'a, B> {
    pub fn new(transport: &'a ThrottledTransport<B>, page_size: usize) -> Self {
        Self {
            reader: ResourceReader::new(transport),
            page_size,
        }
    }

    /// Lists the sensors of one location. An empty list is not an error.
    pub async fn list_sensors(&self, location: &Location) -> Result<Vec<Sensor>, TransportError> {
        let request = PageRequest::builder()
            .kind(ResourceKind::Sensors)
            .endpoint(format!("locations/{}/sensors", location.id))
            .cursor(Cursor::PageNumber)
            .limit(self.page_size)
            .build();

        let pages: Vec<_> = self
            .reader
            .read_all::<RawSensor>(request)
            .try_collect()
            .await?;
        Ok(pages
            .iter()
            .flat_map(|page| page.results.iter())
            .map(|raw| Sensor::from_raw(raw, location.id))
            .collect())
    }

    /// Lists the sensors of every location, skipping the ones whose listing fails.
    ///
    /// A location id that appears under several target localities is only fetched once.
    pub async fn enumerate(&self, locations: &[Location]) -> Enumeration {
        let mut enumeration = Enumeration::default();
        let mut known: HashMap<i64, Vec<Sensor>> = HashMap::new();

        for (i, location) in locations.iter().enumerate() {
            let sensors = match known.get(&location.id) {
                Some(sensors) => sensors.clone(),
                None => match self.list_sensors(location).await {
                    Ok(sensors) => {
                        known.insert(location.id, sensors.clone());
                        sensors
                    }
                    Err(e) => {
                        warn!(
                            "Could not list sensors for {} ('{}'): {}",
                            location.label(),
                            location.searched_locality,
                            e
                        );
                        enumeration.failures.push(Failure::new(
                            FailureStage::Enumeration,
                            location.id,
                            &location.searched_locality,
                            None,
                            &e,
                        ));
                        continue;
                    }
                },
            };
            info!(
                "[{}/{}] {} has {} sensor(s)",
                i + 1,
                locations.len(),
                location.label(),
                sensors.len()
            );
            enumeration.per_location.push(LocationSensors {
                location: location.clone(),
                sensors,
            });
        }
        enumeration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{envelope, location_json, sensor_json, ScriptedBackend};
    use crate::transport::error::BackendError;
    use crate::transport::retry::{RetryPolicy, ThrottleConfig};
    use crate::types::raw::RawLocation;

    fn location(id: i64, target: &str) -> Location {
        let raw: RawLocation =
            serde_json::from_value(location_json(id, &format!("Site {id}"), "Quintero", "CL"))
                .unwrap();
        Location::from_raw(&raw, target)
    }

    fn transport(backend: ScriptedBackend) -> ThrottledTransport<ScriptedBackend> {
        ThrottledTransport::new(
            backend,
            "https://api.test/v3",
            RetryPolicy::immediate(3, 3),
            ThrottleConfig::none(),
        )
    }

    #[tokio::test]
    async fn lists_sensors_of_location() -> Result<(), TransportError> {
        let backend = ScriptedBackend::new(|url, _| {
            assert!(url.ends_with("/locations/101/sensors"));
            Ok(envelope(
                vec![sensor_json(1, "pm25", "µg/m³"), sensor_json(2, "so2", "ppb")],
                Some(2),
            ))
        });
        let transport = transport(backend);
        let enumerator = SensorEnumerator::new(&transport, 100);

        let sensors = enumerator.list_sensors(&location(101, "Bocatoma")).await?;

        assert_eq!(sensors.len(), 2);
        assert!(sensors.iter().all(|s| s.location_id == 101));
        assert_eq!(sensors[1].parameter_units.as_deref(), Some("ppb"));
        Ok(())
    }

    #[tokio::test]
    async fn zero_sensors_is_not_a_failure() {
        let transport = transport(ScriptedBackend::new(|_, _| Ok(envelope(vec![], Some(0)))));
        let enumerator = SensorEnumerator::new(&transport, 100);

        let enumeration = enumerator.enumerate(&[location(1, "Indura")]).await;

        assert!(enumeration.failures.is_empty());
        assert_eq!(enumeration.per_location.len(), 1);
        assert_eq!(enumeration.sensor_count(), 0);
    }

    #[tokio::test]
    async fn failing_location_is_skipped() {
        let backend = ScriptedBackend::new(|url, _| {
            if url.contains("/locations/2/") {
                Err(BackendError::Connect(url.to_string()))
            } else {
                Ok(envelope(vec![sensor_json(10, "pm10", "µg/m³")], Some(1)))
            }
        });
        let transport = transport(backend);
        let enumerator = SensorEnumerator::new(&transport, 100);
        let locations = [location(1, "A"), location(2, "B"), location(3, "C")];

        let enumeration = enumerator.enumerate(&locations).await;

        let ids: Vec<i64> = enumeration.per_location.iter().map(|l| l.location.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(enumeration.failures.len(), 1);
        assert_eq!(enumeration.failures[0].location_id, 2);
        assert_eq!(enumeration.failures[0].stage, FailureStage::Enumeration);
        // three attempts on the failing location, one on each of the others
        assert_eq!(transport.backend().call_count(), 5);
    }

    #[tokio::test]
    async fn shared_location_is_fetched_once() {
        let transport = transport(ScriptedBackend::new(|_, _| {
            Ok(envelope(vec![sensor_json(10, "pm10", "µg/m³")], Some(1)))
        }));
        let enumerator = SensorEnumerator::new(&transport, 100);
        let locations = [location(7, "JUNJI"), location(7, "ENAP Price")];

        let enumeration = enumerator.enumerate(&locations).await;

        assert_eq!(enumeration.per_location.len(), 2);
        assert_eq!(enumeration.per_location[1].location.searched_locality, "ENAP Price");
        assert_eq!(transport.backend().call_count(), 1);
    }
}
