use crate::checkpoint::error::CheckpointError;
use crate::checkpoint::frames::{groups_frame, metadata_frame, overview_frame, records_frame};
use crate::checkpoint::summary::ExportSummary;
use crate::harvest::sensor_enumerator::LocationSensors;
use crate::types::measurement::MeasurementRecord;
use crate::utils::ensure_dir_exists;
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    Parquet,
}

/// Everything `finalize` wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub records_csv: PathBuf,
    pub records_parquet: PathBuf,
    pub metadata_csv: PathBuf,
    pub by_locality_csv: PathBuf,
    pub by_parameter_csv: PathBuf,
    pub by_city_csv: PathBuf,
    pub overview_csv: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub summary: ExportSummary,
    pub paths: ExportPaths,
}

/// Writes partial checkpoints during a run and the consolidated export at its end.
///
/// Every file is first written to a temporary file in the output directory, synced,
/// and then renamed into place, so a crash leaves either the previous state or the
/// complete new file, never a torn one. Neither operation modifies its inputs.
pub struct CheckpointWriter {
    output_dir: PathBuf,
    prefix: String,
    stamp: String,
}

impl CheckpointWriter {
    /// `stamp` distinguishes the files of one run from those of other runs.
    pub fn new(output_dir: &Path, prefix: &str, stamp: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            prefix: prefix.to_string(),
            stamp: stamp.to_string(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn partial_path(&self, batch_index: usize) -> PathBuf {
        self.output_dir.join(format!(
            "{}_partial_{}_batch{:03}.csv",
            self.prefix, self.stamp, batch_index
        ))
    }

    fn final_path(&self, suffix: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}{}.{}", self.prefix, self.stamp, suffix, extension))
    }

    /// Writes all records accumulated so far to the partial checkpoint for `batch_index`.
    pub async fn flush(
        &self,
        records: &[MeasurementRecord],
        batch_index: usize,
    ) -> Result<PathBuf, CheckpointError> {
        ensure_dir_exists(&self.output_dir).await?;
        let path = self.partial_path(batch_index);
        let df = records_frame(records).map_err(|e| CheckpointError::Frame("records", e))?;

        write_all(vec![(df, path.clone(), FileFormat::Csv)]).await?;
        info!(
            "Checkpoint {} written with {} records to {:?}",
            batch_index,
            records.len(),
            path
        );
        Ok(path)
    }

    /// Writes the authoritative extract plus its metadata and summary tables.
    pub async fn finalize(
        &self,
        records: &[MeasurementRecord],
        catalog: &[LocationSensors],
    ) -> Result<ExportReport, CheckpointError> {
        ensure_dir_exists(&self.output_dir).await?;
        let summary = ExportSummary::from_records(records);
        let paths = ExportPaths {
            records_csv: self.final_path("", "csv"),
            records_parquet: self.final_path("", "parquet"),
            metadata_csv: self.final_path("_metadata", "csv"),
            by_locality_csv: self.final_path("_by_locality", "csv"),
            by_parameter_csv: self.final_path("_by_parameter", "csv"),
            by_city_csv: self.final_path("_by_city", "csv"),
            overview_csv: self.final_path("_overview", "csv"),
        };

        let records_df = records_frame(records).map_err(|e| CheckpointError::Frame("records", e))?;
        let jobs = vec![
            (records_df.clone(), paths.records_csv.clone(), FileFormat::Csv),
            (records_df, paths.records_parquet.clone(), FileFormat::Parquet),
            (
                metadata_frame(catalog).map_err(|e| CheckpointError::Frame("metadata", e))?,
                paths.metadata_csv.clone(),
                FileFormat::Csv,
            ),
            (
                groups_frame(&summary.by_locality, "searched_locality")
                    .map_err(|e| CheckpointError::Frame("by_locality", e))?,
                paths.by_locality_csv.clone(),
                FileFormat::Csv,
            ),
            (
                groups_frame(&summary.by_parameter, "parameter_name")
                    .map_err(|e| CheckpointError::Frame("by_parameter", e))?,
                paths.by_parameter_csv.clone(),
                FileFormat::Csv,
            ),
            (
                groups_frame(&summary.by_city, "city_name")
                    .map_err(|e| CheckpointError::Frame("by_city", e))?,
                paths.by_city_csv.clone(),
                FileFormat::Csv,
            ),
            (
                overview_frame(&summary).map_err(|e| CheckpointError::Frame("overview", e))?,
                paths.overview_csv.clone(),
                FileFormat::Csv,
            ),
        ];
        write_all(jobs).await?;

        info!(
            "Export written: {} records from {} sensors to {:?}",
            summary.total_records, summary.sensor_count, paths.records_csv
        );
        Ok(ExportReport { summary, paths })
    }
}

/// Opens a finalized Parquet extract for further querying.
pub fn read_extract(path: &Path) -> Result<LazyFrame, CheckpointError> {
    LazyFrame::scan_parquet(path, Default::default())
        .map_err(|e| CheckpointError::ParquetScan(path.to_path_buf(), e))
}

async fn write_all(jobs: Vec<(DataFrame, PathBuf, FileFormat)>) -> Result<(), CheckpointError> {
    task::spawn_blocking(move || -> Result<(), CheckpointError> {
        for (df, path, format) in jobs {
            write_atomically(df, &path, format)?;
        }
        Ok(())
    })
    .await?
}

fn write_atomically(mut df: DataFrame, path: &Path, format: FileFormat) -> Result<(), CheckpointError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file =
        NamedTempFile::new_in(dir).map_err(|e| CheckpointError::TempFile(dir.to_path_buf(), e))?;

    match format {
        FileFormat::Csv => CsvWriter::new(temp_file.as_file_mut())
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| CheckpointError::CsvWrite(path.to_path_buf(), e))?,
        FileFormat::Parquet => {
            ParquetWriter::new(temp_file.as_file_mut())
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)
                .map_err(|e| CheckpointError::ParquetWrite(path.to_path_buf(), e))?;
        }
    }

    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| CheckpointError::Sync(path.to_path_buf(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| CheckpointError::Persist(path.to_path_buf(), e.error))?;
    Ok(())
}
