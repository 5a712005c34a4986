//! Core data models for music tidying.
//!
//! This module contains the value objects produced by the cleaning engine
//! and the per-run records and statistics used by both passes.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Cleaning Models
// ============================================================================

/// What kind of text is being cleaned. File names and album folders lose
/// characters that are illegal in paths; tag values keep them. Album text
/// keeps its leading digits ("1989", "808s & Heartbreak").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    FileName,
    TagValue,
    AlbumTag,
    AlbumFolder,
}

impl TextKind {
    pub fn is_path_component(self) -> bool {
        matches!(self, TextKind::FileName | TextKind::AlbumFolder)
    }

    pub fn is_album(self) -> bool {
        matches!(self, TextKind::AlbumTag | TextKind::AlbumFolder)
    }
}

/// Outcome of one convergence run over one input string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningResult {
    pub final_text: String,
    pub changed: bool,
    /// Passes executed, including the final no-change pass (1..=10).
    pub passes_run: u32,
    /// Domains removed by the website rule, lowercase, without scheme or path.
    pub extracted_tokens: FxHashSet<String>,
}

// ============================================================================
// Tag Fields
// ============================================================================

/// Tag fields the tag layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagField {
    Title,
    Artist,
    Album,
    Year,
}

impl TagField {
    /// Fields whose text is run through the cleaning engine. Year is read but never rewritten.
    pub const CLEANED: [TagField; 3] = [TagField::Title, TagField::Artist, TagField::Album];

    pub fn as_str(self) -> &'static str {
        match self {
            TagField::Title => "title",
            TagField::Artist => "artist",
            TagField::Album => "album",
            TagField::Year => "year",
        }
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// File Records
// ============================================================================

/// One on-disk audio file during a run.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub original_path: PathBuf,
    /// Updated in place as renames and moves land (or are planned under dry-run).
    pub current_path: PathBuf,
    /// Extension as found on disk, without the dot, original casing.
    pub extension: String,
    pub tag_snapshot: FxHashMap<TagField, String>,
    /// Set once `tag_snapshot` reflects the file's tags.
    pub tags_loaded: bool,
}

impl FileRecord {
    pub fn new(path: PathBuf) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            original_path: path.clone(),
            current_path: path,
            extension,
            tag_snapshot: FxHashMap::default(),
            tags_loaded: false,
        }
    }

    /// Where the file actually sits. Under dry-run no rename landed, so
    /// that is still the original path.
    pub fn on_disk_path(&self, dry_run: bool) -> &Path {
        if dry_run {
            &self.original_path
        } else {
            &self.current_path
        }
    }

    /// Current file name, lossily converted for display and comparison.
    pub fn file_name(&self) -> String {
        file_name_of(&self.current_path)
    }

    /// Current file name without its extension.
    pub fn stem(&self) -> String {
        self.current_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn directory(&self) -> &Path {
        self.current_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Report Rows
// ============================================================================

/// A rename that happened, or would have under dry-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameRow {
    pub original: String,
    pub final_name: String,
    pub directory: String,
    pub dry_run: bool,
}

/// One tag field rewritten by the tag normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataChange {
    pub file: String,
    pub field: TagField,
    pub old: String,
    pub new: String,
}

/// A per-file failure that was caught and counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub file: String,
    pub message: String,
}

/// A file moved into an album folder, or planned to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRow {
    pub file: String,
    pub destination: String,
    pub folder: String,
    pub dry_run: bool,
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters and report rows for one cleaning run.
///
/// Every processed file lands in exactly one of `renamed`,
/// `metadata_updated_only`, `skipped` or `errors`; `metadata_updated`
/// additionally counts renamed files whose tags changed.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub processed: usize,
    pub renamed: usize,
    pub metadata_updated: usize,
    pub metadata_updated_only: usize,
    pub skipped: usize,
    pub errors: usize,
    pub extracted_tokens: BTreeSet<String>,
    pub renames: Vec<RenameRow>,
    pub metadata_changes: Vec<MetadataChange>,
    pub error_log: Vec<FileError>,
    pub dry_run: bool,
}

impl RunStatistics {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Sum of the mutually exclusive outcome buckets; equals `processed`.
    pub fn accounted(&self) -> usize {
        self.renamed + self.metadata_updated_only + self.skipped + self.errors
    }

    pub fn record_error(&mut self, file: &str, message: String) {
        self.errors += 1;
        self.error_log.push(FileError {
            file: file.to_string(),
            message,
        });
    }

    /// Print the summary block to stdout.
    pub fn print_summary(&self) {
        println!("\n{:=<60}", "");
        println!("PROCESSING STATISTICS");
        println!("{:=<60}", "");
        println!("  Total files processed: {}", self.processed);
        println!("  Files renamed: {}", self.renamed);
        println!("  Files with metadata updated: {}", self.metadata_updated);
        println!("  Files skipped (no changes): {}", self.skipped);
        println!("  Errors encountered: {}", self.errors);
        if !self.extracted_tokens.is_empty() {
            println!("  Removed URLs/domains ({}):", self.extracted_tokens.len());
            for token in &self.extracted_tokens {
                println!("    - {}", token);
            }
        }
        if self.dry_run {
            println!("  DRY RUN - no files were renamed or modified");
        }
        println!("{:=<60}", "");
    }
}

// ============================================================================
// Album Models
// ============================================================================

/// Files sharing one normalized (album, year) identity.
#[derive(Debug, Clone)]
pub struct AlbumGroup {
    pub normalized_album: String,
    pub year: Option<String>,
    pub member_files: Vec<FileRecord>,
    pub target_folder_name: String,
}

/// Counters and report rows for one album pass.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumStatistics {
    pub files_seen: usize,
    pub groups: usize,
    pub groups_moved: usize,
    pub moved: usize,
    /// Members of a moved group that already sat in their album folder.
    pub already_in_place: usize,
    /// Members of groups at or below the size threshold.
    pub left_in_place: usize,
    pub folders_created: usize,
    pub directories_removed: usize,
    pub errors: usize,
    pub moves: Vec<MoveRow>,
    pub created_folders: Vec<String>,
    pub removed_directories: Vec<String>,
    pub error_log: Vec<FileError>,
    pub dry_run: bool,
}

impl AlbumStatistics {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_error(&mut self, file: &str, message: String) {
        self.errors += 1;
        self.error_log.push(FileError {
            file: file.to_string(),
            message,
        });
    }

    pub fn print_summary(&self) {
        println!("\n{:=<60}", "");
        println!("ALBUM MAPPING STATISTICS");
        println!("{:=<60}", "");
        println!("  Total files seen: {}", self.files_seen);
        println!("  Album groups: {} ({} moved)", self.groups, self.groups_moved);
        println!("  Files moved: {}", self.moved);
        println!("  Files already in place: {}", self.already_in_place);
        println!("  Files left (small albums): {}", self.left_in_place);
        println!("  Album folders created: {}", self.folders_created);
        println!("  Empty directories removed: {}", self.directories_removed);
        println!("  Errors encountered: {}", self.errors);
        if self.dry_run {
            println!("  DRY RUN - no files were moved and no folders were created");
        }
        println!("{:=<60}", "");
    }
}
