//! Run options, built from the command line by the binaries.
//!
//! `--verbose` only raises the log level, so it is consumed by
//! [`crate::progress::init_logging`] and never reaches the passes.

/// Options for the cleaning pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    pub dry_run: bool,
    /// Skip filename rewriting.
    pub metadata_only: bool,
    /// Skip tag rewriting.
    pub filename_only: bool,
}

impl CleanOptions {
    pub fn cleans_metadata(&self) -> bool {
        !self.filename_only
    }

    pub fn cleans_filenames(&self) -> bool {
        !self.metadata_only
    }
}

/// Options for the album pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlbumOptions {
    pub dry_run: bool,
    /// Remove source directories the pass leaves empty.
    pub remove_empty: bool,
}
