//! Errors in the library.
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the components of the library.
#[derive(Debug, Error)]
pub enum A2cError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// The checkpoint file does not exist.
    #[error("Checkpoint not found: {0:?}")]
    CheckpointNotFound(PathBuf),

    /// The checkpoint file exists but cannot be restored.
    #[error("Malformed checkpoint {path:?}: {reason}")]
    MalformedCheckpoint {
        /// Path of the checkpoint.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The name of a policy variant is not known.
    #[error("Unknown policy variant: {0}")]
    UnknownPolicy(String),

    /// The name of a learning rate schedule is not known.
    #[error("Unknown learning rate schedule: {0}")]
    UnknownSchedule(String),

    /// An environment worker failed or disconnected.
    #[error("Environment worker {rank} failed: {reason}")]
    WorkerFailed {
        /// Index of the worker.
        rank: usize,
        /// What went wrong.
        reason: String,
    },

    /// Shapes of arrays do not match.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Inconsistent configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
