use crate::checkpoint::error::CheckpointError;
use crate::config::ConfigError;
use crate::run_state::RunPhase;
use crate::transport::error::BackendError;
use thiserror::Error;

/// Conditions that end a harvest run.
///
/// Failures of single locations or sensors never surface here; they are listed in
/// the [`crate::HarvestReport`] instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to set up the HTTP client")]
    Backend(#[from] BackendError),

    #[error("None of the target localities could be resolved (unresolved: {0:?})")]
    NothingResolved(Vec<String>),

    #[error("Sensor enumeration failed for all {0} resolved locations")]
    AllEnumerationsFailed(usize),

    #[error("Measurement collection failed for all {0} sensors")]
    AllCollectionsFailed(usize),

    #[error("Illegal run transition from {from} to {to}")]
    IllegalTransition { from: RunPhase, to: RunPhase },
}
