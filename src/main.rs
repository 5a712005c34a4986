use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use music_tidy::albums::AlbumGrouper;
use music_tidy::config::{AlbumOptions, CleanOptions};
use music_tidy::models::{AlbumStatistics, FileRecord};
use music_tidy::processor::{CleanRun, FileProcessor};
use music_tidy::resolve::DirectoryIndex;
use music_tidy::progress::{create_progress_bar, create_spinner, format_duration, init_logging, set_log_only};
use music_tidy::report::{render_markdown, write_json, write_report, StatsDocument};
use music_tidy::safety::{validate_output_path, validate_root};
use music_tidy::scan::{discover_audio_files, DEFAULT_MAX_DEPTH};
use music_tidy::tags::FileTagStore;

#[derive(Parser)]
#[command(name = "music-tidy")]
#[command(about = "Clean music file names and tags, optionally grouping albums into folders")]
struct Args {
    /// Root directory to process
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Show what would change without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Log every file, including unchanged ones
    #[arg(long, short)]
    verbose: bool,

    /// Only clean tags, keep file names
    #[arg(long, conflicts_with = "filename_only")]
    metadata_only: bool,

    /// Only clean file names, keep tags
    #[arg(long)]
    filename_only: bool,

    /// Also group albums with more than three tracks into folders
    #[arg(long)]
    albums: bool,

    /// With --albums, remove directories left empty by the moves
    #[arg(long)]
    remove_empty: bool,

    /// Directory levels below the root to search
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Write a Markdown report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,
}

/// Group the files where the cleaning pass left them (or planned to).
fn run_albums(root: &Path, records: Vec<FileRecord>, index: DirectoryIndex, options: AlbumOptions) -> AlbumStatistics {
    let pb = create_progress_bar(records.len() as u64, "Grouping albums");
    let stats = AlbumGrouper::new(options, &FileTagStore)
        .with_index(index)
        .run(root, records, &pb);
    pb.finish_with_message(format!("Grouped {} files", stats.files_seen));
    stats
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
    let options = CleanOptions {
        dry_run: args.dry_run,
        metadata_only: args.metadata_only,
        filename_only: args.filename_only,
    };
    info!(root = %root.display(), dry_run = options.dry_run, "starting cleanup");

    let spinner = create_spinner("Scanning for audio files");
    let files = discover_audio_files(&root, args.max_depth);
    spinner.finish_with_message(format!("Found {} audio files", files.len()));

    let pb = create_progress_bar(files.len() as u64, "Cleaning");
    let CleanRun { stats, records, index } = FileProcessor::new(options, &FileTagStore).run(&files, &pb);
    pb.finish_with_message(format!("Cleaned {} files", stats.processed));
    stats.print_summary();

    let album_stats = if args.albums {
        let album_options = AlbumOptions {
            dry_run: args.dry_run,
            remove_empty: args.remove_empty,
        };
        let album_stats = run_albums(&root, records, index, album_options);
        album_stats.print_summary();
        Some(album_stats)
    } else {
        None
    };

    if let Some(path) = &args.report {
        let content = render_markdown(&root, Some(&stats), album_stats.as_ref());
        write_report(path, &content)?;
        println!("Report written to {}", path.display());
    }
    if let Some(path) = &args.stats_json {
        let doc = StatsDocument {
            root: root.display().to_string(),
            cleaning: Some(&stats),
            albums: album_stats.as_ref(),
        };
        write_json(&doc, path)?;
        println!("Statistics written to {}", path.display());
    }

    println!("Elapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
