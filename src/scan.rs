//! Audio file discovery.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Extensions treated as audio, compared case-insensitively.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "aac", "ogg", "m4a", "wma", "opus", "alac", "aiff", "dsd", "dff", "dsf",
];

/// Default number of directory levels below the root that are searched.
pub const DEFAULT_MAX_DEPTH: usize = 10;

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// All audio files under `root`, in walk order, sorted by name within each
/// directory so runs are reproducible. Hidden files and directories are
/// skipped. Unreadable entries are logged and skipped.
pub fn discover_audio_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(max_depth.saturating_add(1))
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_audio_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!("Error accessing entry: {}", e),
        }
    }
    debug!(count = files.len(), root = %root.display(), "discovered audio files");
    files
}
