//! Orchestrates a complete harvest run: resolution, sensor enumeration,
//! measurement collection with periodic checkpoints, and the final export.

use crate::checkpoint::writer::{CheckpointWriter, ExportReport};
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::harvest::failure::{Failure, FailureStage};
use crate::harvest::measurement_collector::MeasurementCollector;
use crate::harvest::sensor_enumerator::SensorEnumerator;
use crate::resolver::location_resolver::{CatalogScope, LocationResolver};
use crate::resolver::resolution::Resolution;
use crate::run_state::{RunPhase, RunStateMachine};
use crate::transport::backend::{HttpBackend, ReqwestBackend};
use crate::transport::throttled::ThrottledTransport;
use crate::types::measurement::MeasurementRecord;
use crate::utils::run_stamp;
use bon::bon;
use log::{error, info, warn};
use std::path::PathBuf;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestReport {
    pub phase: RunPhase,
    pub resolution: Resolution,
    /// Locations whose sensors were listed.
    pub locations_enumerated: usize,
    pub sensors_enumerated: usize,
    /// Every record collected, in collection order.
    pub records: Vec<MeasurementRecord>,
    /// Raw measurements refused at normalization.
    pub rejected_measurements: usize,
    /// Partial checkpoint files, in the order they were written.
    pub checkpoints: Vec<PathBuf>,
    pub export: ExportReport,
    /// Locations and sensors that contributed nothing because their fetch failed.
    pub failures: Vec<Failure>,
}

impl HarvestReport {
    pub fn failures_in(&self, stage: FailureStage) -> impl Iterator<Item = &Failure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }
}

/// Harvests measurements for a set of named localities.
///
/// All calls go out one at a time through a single throttled transport, so the
/// provider's rate limit is respected across every stage of a run.
///
/// # Examples
///
/// ```no_run
/// # use aq_harvest::{Harvester, HarvestConfig, HarvestError};
/// # async fn run() -> Result<(), HarvestError> {
/// let harvester = Harvester::new(HarvestConfig::from_env()?)?;
/// let report = harvester
///     .run()
///     .localities(vec!["Bocatoma".to_string(), "JUNJI".to_string()])
///     .max_records_per_sensor(200)
///     .call()
///     .await?;
/// println!("{} records in {:?}", report.records.len(), report.export.paths.records_csv);
/// # Ok(())
/// # }
/// ```
pub struct Harvester<B = ReqwestBackend> {
    config: HarvestConfig,
    transport: ThrottledTransport<B>,
}

impl Harvester<ReqwestBackend> {
    /// Creates a harvester talking to the configured API over HTTPS.
    pub fn new(config: HarvestConfig) -> Result<Self, HarvestError> {
        config.validate()?;
        let backend = ReqwestBackend::new(&config.api_key, config.request_timeout)?;
        Ok(Self::with_backend(config, backend))
    }
}

#[bon]
impl<B: HttpBackend> Harvester<B> {
    /// Creates a harvester on top of any [`HttpBackend`].
    pub fn with_backend(config: HarvestConfig, backend: B) -> Self {
        let transport = ThrottledTransport::new(
            backend,
            &config.base_url,
            config.retry.clone(),
            config.throttle.clone(),
        );
        Self { config, transport }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Runs the whole pipeline for `localities`.
    ///
    /// # Optional Builder Methods
    ///
    /// * `.max_records_per_sensor(usize)`: overrides the configured cap per sensor.
    /// * `.checkpoint_every(usize)`: overrides the configured checkpoint interval, in locations.
    ///
    /// # Errors
    ///
    /// * [`HarvestError::NothingResolved`] if no target locality matched any location.
    /// * [`HarvestError::AllEnumerationsFailed`] if no resolved location could list its sensors.
    /// * [`HarvestError::AllCollectionsFailed`] if sensors were found but every collection failed.
    /// * [`HarvestError::Checkpoint`] if a checkpoint or the export could not be written.
    #[builder]
    pub async fn run(
        &self,
        localities: Vec<String>,
        max_records_per_sensor: Option<usize>,
        checkpoint_every: Option<usize>,
    ) -> Result<HarvestReport, HarvestError> {
        let max_records = max_records_per_sensor.unwrap_or(self.config.max_records_per_sensor);
        let checkpoint_every = checkpoint_every.unwrap_or(self.config.checkpoint_every);
        let mut state = RunStateMachine::new();
        self.config.log_config();

        // Resolving
        state.advance(RunPhase::Resolving)?;
        let resolver = LocationResolver::new(&self.transport, self.catalog_scope());
        let resolution = resolver.resolve(&localities).await;
        if resolution.is_empty() {
            return fail(
                &mut state,
                HarvestError::NothingResolved(resolution.unresolved.clone()),
            );
        }
        let locations = resolution.locations();
        info!(
            "Resolved {} location(s) for {} target(s), {} unresolved",
            locations.len(),
            resolution.matches.len(),
            resolution.unresolved.len()
        );

        // Enumerating
        state.advance(RunPhase::Enumerating)?;
        let enumerator = SensorEnumerator::new(&self.transport, self.config.page_size);
        let enumeration = enumerator.enumerate(&locations).await;
        if enumeration.per_location.is_empty() {
            return fail(
                &mut state,
                HarvestError::AllEnumerationsFailed(locations.len()),
            );
        }
        let sensors_enumerated = enumeration.sensor_count();
        info!(
            "Enumerated {} sensor(s) across {} location(s)",
            sensors_enumerated,
            enumeration.per_location.len()
        );

        // Collecting
        state.advance(RunPhase::Collecting)?;
        let writer = CheckpointWriter::new(
            &self.config.output_dir,
            &self.config.file_prefix,
            &run_stamp(),
        );
        let collector = MeasurementCollector::new(&self.transport, self.config.page_size);
        let mut failures = enumeration.failures.clone();
        let mut records: Vec<MeasurementRecord> = Vec::new();
        let mut checkpoints = Vec::new();
        let mut rejected = 0;
        let mut attempted = 0;
        let mut succeeded = 0;

        for (i, entry) in enumeration.per_location.iter().enumerate() {
            let location = &entry.location;
            for sensor in &entry.sensors {
                attempted += 1;
                match collector.collect(location, sensor, max_records).await {
                    Ok(collected) => {
                        succeeded += 1;
                        info!(
                            "Sensor {} ({}) at {}: {} record(s)",
                            sensor.id,
                            sensor.parameter_name.as_deref().unwrap_or("?"),
                            location.label(),
                            collected.records.len()
                        );
                        rejected += collected.rejected;
                        records.extend(collected.records);
                    }
                    Err(e) => {
                        warn!(
                            "Skipping sensor {} at {}: {}",
                            sensor.id,
                            location.label(),
                            e
                        );
                        failures.push(Failure::new(
                            FailureStage::Collection,
                            location.id,
                            &location.searched_locality,
                            Some(sensor.id),
                            &e,
                        ));
                    }
                }
            }

            if checkpoint_every > 0 && (i + 1) % checkpoint_every == 0 {
                let batch_index = checkpoints.len() + 1;
                match writer.flush(&records, batch_index).await {
                    Ok(path) => checkpoints.push(path),
                    Err(e) => return fail(&mut state, e.into()),
                }
            }
        }

        if attempted > 0 && succeeded == 0 {
            return fail(&mut state, HarvestError::AllCollectionsFailed(attempted));
        }

        // Finalizing
        state.advance(RunPhase::Finalizing)?;
        let export = match writer.finalize(&records, &enumeration.per_location).await {
            Ok(export) => export,
            Err(e) => return fail(&mut state, e.into()),
        };
        state.advance(RunPhase::Done)?;

        if !failures.is_empty() {
            warn!("{} item(s) were skipped after failed fetches", failures.len());
        }
        info!(
            "Harvest done: {} records, {} checkpoint(s), export at {:?}",
            records.len(),
            checkpoints.len(),
            export.paths.records_csv
        );

        Ok(HarvestReport {
            phase: state.phase(),
            resolution,
            locations_enumerated: enumeration.per_location.len(),
            sensors_enumerated,
            records,
            rejected_measurements: rejected,
            checkpoints,
            export,
            failures,
        })
    }

    fn catalog_scope(&self) -> CatalogScope {
        CatalogScope {
            country_code: self.config.country_code.clone(),
            country_id: self.config.country_id,
            page_size: self.config.page_size,
            max_catalog_pages: self.config.max_catalog_pages,
            stop_when_all_matched: self.config.catalog_early_stop,
        }
    }
}

fn fail<T>(state: &mut RunStateMachine, err: HarvestError) -> Result<T, HarvestError> {
    error!("Harvest failed during {}: {}", state.phase(), err);
    state.fail();
    Err(err)
}
