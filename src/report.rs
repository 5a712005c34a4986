//! Run artifacts: the Markdown report and the JSON statistics dump.

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

use crate::models::{AlbumStatistics, FileError, RunStatistics};

/// Statistics of whichever passes ran, as written by `--stats-json`.
#[derive(Debug, Serialize)]
pub struct StatsDocument<'a> {
    pub root: String,
    pub cleaning: Option<&'a RunStatistics>,
    pub albums: Option<&'a AlbumStatistics>,
}

/// Markdown table cells cannot contain raw pipes or newlines.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Render the report with the current local time.
pub fn render_markdown(
    root: &Path,
    cleaning: Option<&RunStatistics>,
    albums: Option<&AlbumStatistics>,
) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    render_markdown_at(root, cleaning, albums, &timestamp)
}

pub fn render_markdown_at(
    root: &Path,
    cleaning: Option<&RunStatistics>,
    albums: Option<&AlbumStatistics>,
    timestamp: &str,
) -> String {
    let mut out = String::new();
    let dry_run = cleaning.is_some_and(|s| s.dry_run) || albums.is_some_and(|s| s.dry_run);

    // Writing into a String cannot fail.
    let _ = writeln!(out, "# Music Tidy Report\n");
    let _ = writeln!(out, "- Generated: {}", timestamp);
    let _ = writeln!(out, "- Directory: `{}`", root.display());
    let _ = writeln!(out, "- Mode: {}\n", if dry_run { "dry run" } else { "live" });

    if let Some(stats) = cleaning {
        write_cleaning(&mut out, stats);
    }
    if let Some(stats) = albums {
        write_albums(&mut out, stats);
    }

    if dry_run {
        let _ = writeln!(
            out,
            "> **Dry run:** nothing on disk was changed. The tables above list what a live run would do."
        );
    }
    out
}

fn write_cleaning(out: &mut String, stats: &RunStatistics) {
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "| Metric | Count |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Files processed | {} |", stats.processed);
    let _ = writeln!(out, "| Files renamed | {} |", stats.renamed);
    let _ = writeln!(out, "| Metadata updated | {} |", stats.metadata_updated);
    let _ = writeln!(out, "| Metadata updated only | {} |", stats.metadata_updated_only);
    let _ = writeln!(out, "| Skipped (no changes) | {} |", stats.skipped);
    let _ = writeln!(out, "| Errors | {} |\n", stats.errors);

    if !stats.renames.is_empty() {
        let _ = writeln!(out, "## File Renames\n");
        let _ = writeln!(out, "| Original | Final | Directory |");
        let _ = writeln!(out, "|---|---|---|");
        for row in &stats.renames {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                cell(&row.original),
                cell(&row.final_name),
                cell(&row.directory)
            );
        }
        out.push('\n');
    }

    if !stats.metadata_changes.is_empty() {
        let _ = writeln!(out, "## Metadata Updates\n");
        let _ = writeln!(out, "| File | Field | Old | New |");
        let _ = writeln!(out, "|---|---|---|---|");
        for change in &stats.metadata_changes {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                cell(&change.file),
                change.field,
                cell(&change.old),
                cell(&change.new)
            );
        }
        out.push('\n');
    }

    if !stats.extracted_tokens.is_empty() {
        let _ = writeln!(out, "## Removed URLs and Domains\n");
        for token in &stats.extracted_tokens {
            let _ = writeln!(out, "- `{}`", token);
        }
        out.push('\n');
    }

    write_errors(out, "Errors", &stats.error_log);
}

fn write_albums(out: &mut String, stats: &AlbumStatistics) {
    let _ = writeln!(out, "## Album Summary\n");
    let _ = writeln!(out, "| Metric | Count |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Files seen | {} |", stats.files_seen);
    let _ = writeln!(out, "| Album groups | {} |", stats.groups);
    let _ = writeln!(out, "| Groups moved | {} |", stats.groups_moved);
    let _ = writeln!(out, "| Files moved | {} |", stats.moved);
    let _ = writeln!(out, "| Already in place | {} |", stats.already_in_place);
    let _ = writeln!(out, "| Left in place | {} |", stats.left_in_place);
    let _ = writeln!(out, "| Folders created | {} |", stats.folders_created);
    let _ = writeln!(out, "| Directories removed | {} |", stats.directories_removed);
    let _ = writeln!(out, "| Errors | {} |\n", stats.errors);

    if !stats.moves.is_empty() {
        let _ = writeln!(out, "## Album Moves\n");
        let _ = writeln!(out, "| File | Folder | New Name |");
        let _ = writeln!(out, "|---|---|---|");
        for row in &stats.moves {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                cell(&row.file),
                cell(&row.folder),
                cell(&row.destination)
            );
        }
        out.push('\n');
    }

    if !stats.removed_directories.is_empty() {
        let _ = writeln!(out, "## Removed Directories\n");
        for dir in &stats.removed_directories {
            let _ = writeln!(out, "- `{}`", dir);
        }
        out.push('\n');
    }

    write_errors(out, "Album Errors", &stats.error_log);
}

fn write_errors(out: &mut String, heading: &str, errors: &[FileError]) {
    if errors.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {}\n", heading);
    let _ = writeln!(out, "| File | Error |");
    let _ = writeln!(out, "|---|---|");
    for error in errors {
        let _ = writeln!(out, "| {} | {} |", cell(&error.file), cell(&error.message));
    }
    out.push('\n');
}

pub fn write_report(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write statistics to {}", path.display()))?;
    Ok(())
}
