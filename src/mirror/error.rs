//! Error types for the mirror system.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from mirror operations.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Source directory does not exist: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Source path is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    #[error("Destination {destination} lies inside source {source_root}")]
    DestinationInsideSource {
        source_root: PathBuf,
        destination: PathBuf,
    },

    #[error("Cannot prepare destination {path}: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No mappings configured")]
    NoMappings,

    #[error("Path {path} is not under {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Mirror is already running")]
    AlreadyRunning,
}

impl MirrorError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<notify::Error> for MirrorError {
    fn from(e: notify::Error) -> Self {
        MirrorError::InitFailed {
            reason: e.to_string(),
        }
    }
}
