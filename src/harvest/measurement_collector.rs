use crate::pagination::reader::{Cursor, PageRequest, ResourceReader};
use crate::transport::backend::HttpBackend;
use crate::transport::error::TransportError;
use crate::transport::retry::ResourceKind;
use crate::transport::throttled::ThrottledTransport;
use crate::types::location::Location;
use crate::types::measurement::MeasurementRecord;
use crate::types::raw::RawMeasurement;
use crate::types::sensor::Sensor;
use futures_util::{pin_mut, TryStreamExt};
use log::{debug, warn};

/// Records collected for one sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorMeasurements {
    pub records: Vec<MeasurementRecord>,
    /// Raw items refused at normalization (inverted periods).
    pub rejected: usize,
}

pub struct MeasurementCollector<'a, B> {
    reader: ResourceReader<'a, B>,
    page_size: usize,
}

impl<'a, B: HttpBackend> MeasurementCollector<'a, B> {
    pub fn new(transport: &'a ThrottledTransport<B>, page_size: usize) -> Self {
        Self {
            reader: ResourceReader::new(transport),
            page_size,
        }
    }

    /// Fetches at most `max_records` measurements of `sensor` and flattens them
    /// with the location and sensor context.
    ///
    /// Collection is all-or-nothing: if any page fails, the error is returned and
    /// the records of earlier pages are discarded.
    ///
    /// The page budget is `ceil(max_records / limit)`, extended by one page for
    /// every `limit` items that were rejected or unparseable, so discarded items do
    /// not eat into the cap. The extension is at most the base budget again.
    pub async fn collect(
        &self,
        location: &Location,
        sensor: &Sensor,
        max_records: usize,
    ) -> Result<SensorMeasurements, TransportError> {
        let mut collected = SensorMeasurements::default();
        if max_records == 0 {
            return Ok(collected);
        }

        let limit = self.page_size.min(max_records).max(1);
        let base_pages = max_records.div_ceil(limit);
        let max_pages = u32::try_from(base_pages.saturating_mul(2)).unwrap_or(u32::MAX);
        let request = PageRequest::builder()
            .kind(ResourceKind::Measurements)
            .endpoint(format!("sensors/{}/measurements", sensor.id))
            .cursor(Cursor::PageNumber)
            .limit(limit)
            .max_pages(max_pages)
            .build();

        let pages = self.reader.read_all::<RawMeasurement>(request);
        pin_mut!(pages);
        let mut pages_read = 0usize;
        let mut discarded = 0usize;
        while let Some(page) = pages.try_next().await? {
            pages_read += 1;
            discarded += page.raw_len - page.results.len();
            for raw in &page.results {
                if collected.records.len() >= max_records {
                    break;
                }
                match MeasurementRecord::from_raw(raw, location, sensor) {
                    Ok(record) => collected.records.push(record),
                    Err(e) => {
                        warn!("Rejected measurement: {}", e);
                        collected.rejected += 1;
                        discarded += 1;
                    }
                }
            }
            if collected.records.len() >= max_records {
                debug!(
                    "Reached {} records for sensor {}, not reading further",
                    max_records, sensor.id
                );
                break;
            }
            let budget = max_records.saturating_add(discarded).div_ceil(limit);
            if pages_read >= budget {
                debug!(
                    "Page budget of {} spent for sensor {} with {} record(s)",
                    budget,
                    sensor.id,
                    collected.records.len()
                );
                break;
            }
        }
        Ok(collected)
    }
}
