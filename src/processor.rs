//! The cleaning pass: tag normalization followed by filename rewriting for
//! every discovered file, one file at a time.
//!
//! Each file either succeeds as a whole and is merged into the statistics,
//! or fails and is only counted as an error. No per-file failure escapes
//! [`FileProcessor::run`].

use indicatif::ProgressBar;
use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::CleanOptions;
use crate::converge::clean_file_stem;
use crate::error::{self, Result, TidyError};
use crate::metadata::{normalize_tags, TagNormalization};
use crate::models::{FileRecord, RenameRow, RunStatistics};
use crate::progress::log_progress;
use crate::resolve::{compose_name, DirectoryIndex};
use crate::tags::TagStore;

const PROGRESS_INTERVAL: u64 = 100;

/// Everything one file contributed, merged only if the whole file succeeded.
#[derive(Default)]
struct FileOutcome {
    tags: Option<TagNormalization>,
    rename: Option<RenameRow>,
    stem_tokens: FxHashSet<String>,
}

/// What the cleaning pass leaves for the album pass: every file at its
/// post-run path (planned under dry-run) and the directory listings that
/// already account for the renames.
pub struct CleanRun {
    pub stats: RunStatistics,
    pub records: Vec<FileRecord>,
    pub index: DirectoryIndex,
}

pub struct FileProcessor<'a> {
    options: CleanOptions,
    tags: &'a dyn TagStore,
    index: DirectoryIndex,
    stats: RunStatistics,
}

impl<'a> FileProcessor<'a> {
    pub fn new(options: CleanOptions, tags: &'a dyn TagStore) -> Self {
        Self {
            options,
            tags,
            index: DirectoryIndex::new(),
            stats: RunStatistics::new(options.dry_run),
        }
    }

    /// Start from listings that are already loaded.
    pub fn with_index(mut self, index: DirectoryIndex) -> Self {
        self.index = index;
        self
    }

    /// Process `files` in order.
    pub fn run(mut self, files: &[PathBuf], pb: &ProgressBar) -> CleanRun {
        let total = files.len() as u64;
        let mut records = Vec::with_capacity(files.len());
        for (i, path) in files.iter().enumerate() {
            records.push(self.process_file(path));
            pb.inc(1);
            log_progress("Cleaning", i as u64 + 1, total, PROGRESS_INTERVAL);
        }
        CleanRun {
            stats: self.stats,
            records,
            index: self.index,
        }
    }

    fn process_file(&mut self, path: &Path) -> FileRecord {
        self.stats.processed += 1;
        let mut record = FileRecord::new(path.to_path_buf());
        match self.clean_record(&mut record) {
            Ok(outcome) => self.merge(outcome),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to process file");
                self.stats.record_error(&file_display(path), e.to_string());
            }
        }
        record
    }

    fn clean_record(&mut self, record: &mut FileRecord) -> Result<FileOutcome> {
        let mut outcome = FileOutcome::default();
        let dry_run = self.options.dry_run;

        if self.options.cleans_metadata() {
            let mut access = self.tags.open(&record.current_path)?;
            let result = normalize_tags(record, access.as_mut(), dry_run)?;
            for change in &result.changes {
                info!(
                    file = %change.file,
                    field = %change.field,
                    old = %change.old,
                    new = %change.new,
                    dry_run,
                    "updating tag"
                );
            }
            outcome.tags = Some(result);
        }

        if self.options.cleans_filenames() {
            let stem = record.stem();
            let cleaned = clean_file_stem(strip_repeated_extension(&stem, &record.extension));
            outcome.stem_tokens = cleaned.extracted_tokens;
            outcome.rename = self.rename(record, &cleaned.final_text)?;
        }

        Ok(outcome)
    }

    /// Rename `record` to `stem` plus its original extension, resolving
    /// collisions in its directory. Returns `None` when the name is unchanged.
    fn rename(&mut self, record: &mut FileRecord, stem: &str) -> Result<Option<RenameRow>> {
        let current_name = record.file_name();
        if compose_name(stem, &record.extension, None) == current_name {
            debug!(file = %current_name, "name already clean");
            return Ok(None);
        }

        let dir = record.directory().to_path_buf();
        let final_name = self
            .index
            .claim_unique(&dir, stem, &record.extension, Some(&current_name))
            .map_err(|e| error::fs("list directory", &dir, e))?;
        if final_name == current_name {
            debug!(file = %current_name, "name already clean");
            return Ok(None);
        }

        let target = dir.join(&final_name);
        if !self.options.dry_run {
            if target.exists() {
                self.index.release(&dir, &final_name);
                return Err(TidyError::DestinationExists(target));
            }
            if let Err(e) = fs::rename(&record.current_path, &target) {
                self.index.release(&dir, &final_name);
                return Err(error::fs("rename", &record.current_path, e));
            }
        }
        self.index.release(&dir, &current_name);

        info!(
            from = %current_name,
            to = %final_name,
            directory = %dir.display(),
            dry_run = self.options.dry_run,
            "renaming file"
        );
        record.current_path = target;

        Ok(Some(RenameRow {
            original: current_name,
            final_name,
            directory: dir.display().to_string(),
            dry_run: self.options.dry_run,
        }))
    }

    fn merge(&mut self, outcome: FileOutcome) {
        let stats = &mut self.stats;
        let tags_changed = outcome.tags.as_ref().is_some_and(|t| t.changed());

        if let Some(tags) = outcome.tags {
            stats.extracted_tokens.extend(tags.extracted_tokens);
            stats.metadata_changes.extend(tags.changes);
        }
        stats.extracted_tokens.extend(outcome.stem_tokens);

        match outcome.rename {
            Some(row) => {
                stats.renamed += 1;
                if tags_changed {
                    stats.metadata_updated += 1;
                }
                stats.renames.push(row);
            }
            None if tags_changed => {
                stats.metadata_updated += 1;
                stats.metadata_updated_only += 1;
            }
            None => stats.skipped += 1,
        }
    }
}

/// "Song.mp3" with extension "mp3" -> "Song", for files named "Song.mp3.mp3".
/// Case is ignored; any other inner extension is kept.
fn strip_repeated_extension<'s>(stem: &'s str, extension: &str) -> &'s str {
    let mut stem = stem;
    if extension.is_empty() {
        return stem;
    }
    while let Some((base, inner)) = stem.rsplit_once('.') {
        if !inner.eq_ignore_ascii_case(extension) {
            break;
        }
        stem = base;
    }
    stem
}

fn file_display(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
