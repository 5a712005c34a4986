//! Group an existing library into album folders without touching names or tags.
//! Usage: album-mapper [DIRECTORY] [--dry-run] [--remove-empty]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use music_tidy::albums::AlbumGrouper;
use music_tidy::config::AlbumOptions;
use music_tidy::models::FileRecord;
use music_tidy::progress::{create_progress_bar, create_spinner, format_duration, init_logging, set_log_only};
use music_tidy::report::{render_markdown, write_json, write_report, StatsDocument};
use music_tidy::safety::{validate_output_path, validate_root};
use music_tidy::scan::{discover_audio_files, DEFAULT_MAX_DEPTH};
use music_tidy::tags::FileTagStore;

#[derive(Parser)]
#[command(name = "album-mapper")]
#[command(about = "Move albums with more than three tracks into their own folders")]
struct Args {
    /// Root directory to process
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Show planned moves without touching any file
    #[arg(long)]
    dry_run: bool,

    #[arg(long, short)]
    verbose: bool,

    /// Remove directories left empty by the moves
    #[arg(long)]
    remove_empty: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Write a Markdown report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,

    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    init_logging(args.verbose);

    for output in [&args.report, &args.stats_json].into_iter().flatten() {
        validate_output_path(output)?;
    }
    let root = validate_root(&args.directory)
        .with_context(|| format!("Cannot process {}", args.directory.display()))?;

    let start = Instant::now();
    let options = AlbumOptions {
        dry_run: args.dry_run,
        remove_empty: args.remove_empty,
    };
    info!(root = %root.display(), dry_run = options.dry_run, "starting album mapping");

    let spinner = create_spinner("Scanning for audio files");
    let files = discover_audio_files(&root, args.max_depth);
    spinner.finish_with_message(format!("Found {} audio files", files.len()));

    let pb = create_progress_bar(files.len() as u64, "Grouping albums");
    let records = files.into_iter().map(FileRecord::new).collect();
    let stats = AlbumGrouper::new(options, &FileTagStore).run(&root, records, &pb);
    pb.finish_with_message(format!("Grouped {} files", stats.files_seen));
    stats.print_summary();

    if let Some(path) = &args.report {
        write_report(path, &render_markdown(&root, None, Some(&stats)))?;
        println!("Report written to {}", path.display());
    }
    if let Some(path) = &args.stats_json {
        let doc = StatsDocument {
            root: root.display().to_string(),
            cleaning: None,
            albums: Some(&stats),
        };
        write_json(&doc, path)?;
        println!("Statistics written to {}", path.display());
    }

    println!("Elapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
