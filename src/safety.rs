//! Setup checks that run before any file is touched.
//!
//! A bad root directory or an output path that could clobber music aborts
//! the run; everything after these checks degrades per file instead.

use std::path::{Path, PathBuf};

use crate::error::TidyError;
use crate::scan::is_audio_file;

/// Resolve the root directory to an absolute path.
///
/// # Returns
/// * `Ok(path)` with the canonical root
/// * `Err(MissingRoot)` if nothing exists at `dir`
/// * `Err(NotADirectory)` if `dir` is a file
pub fn validate_root(dir: &Path) -> Result<PathBuf, TidyError> {
    if !dir.exists() {
        return Err(TidyError::MissingRoot(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(TidyError::NotADirectory(dir.to_path_buf()));
    }
    dir.canonicalize()
        .map_err(|e| crate::error::fs("resolve directory", dir, e))
}

/// Validates that a report or statistics path is safe to overwrite.
///
/// Checks:
/// - Output must not carry an audio extension (it would replace a track)
/// - Output must not be an existing directory
pub fn validate_output_path(output: &Path) -> Result<(), TidyError> {
    if is_audio_file(output) {
        return Err(TidyError::UnsafeOutput {
            path: output.to_path_buf(),
            reason: "output file has an audio extension".to_string(),
        });
    }
    if output.is_dir() {
        return Err(TidyError::UnsafeOutput {
            path: output.to_path_buf(),
            reason: "output is an existing directory".to_string(),
        });
    }
    Ok(())
}
