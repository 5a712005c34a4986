//! Error types for the library.
//!
//! Per-file failures are caught by the passes and counted; only the variants
//! raised before any file is touched (bad root, unsafe output path) abort a run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::tags::TagError;

#[derive(Debug, Error)]
pub enum TidyError {
    #[error("directory does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("safety check failed for '{}': {reason}", path.display())]
    UnsafeOutput { path: PathBuf, reason: String },

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("{op} failed for {}: {source}", path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
}

/// Wrap an I/O error with the operation and path it came from.
pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> TidyError {
    TidyError::Filesystem {
        op,
        path: path.into(),
        source,
    }
}

pub type Result<T> = std::result::Result<T, TidyError>;
