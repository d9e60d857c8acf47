use crate::checkpoint::error::CheckpointError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

const OUTPUT_DIR_NAME: &str = "aq_harvest";

static RUN_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// The user data directory (e.g. `~/.local/share/aq_harvest`), or `./data` when the
/// platform has none.
pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(OUTPUT_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub async fn ensure_dir_exists(path: &Path) -> Result<(), CheckpointError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(CheckpointError::OutputDirNotADirectory(path.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating output directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| CheckpointError::OutputDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(CheckpointError::OutputDirCreation(path.to_path_buf(), e)),
    }
}

/// Stamp naming the files of one run, e.g. `20240301_153000_042_31337_0`.
///
/// Local wall-clock time to the millisecond, then the process id and a per-process
/// sequence number, so runs started at the same moment never share file names.
pub fn run_stamp() -> String {
    format!(
        "{}_{}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"),
        std::process::id(),
        RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}
