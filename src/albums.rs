//! The album pass: group files by normalized (album, year) and move every
//! sufficiently large group into its own folder under the root.
//!
//! Grouping is stable: groups appear in the order their first member was
//! discovered, and members keep discovery order. All naming decisions go
//! through a [`DirectoryIndex`], so dry-run plans exactly what a live run does.

use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::AlbumOptions;
use crate::converge::clean_album_name;
use crate::error::{self, Result, TidyError};
use crate::metadata::read_snapshot;
use crate::models::{file_name_of, AlbumGroup, AlbumStatistics, FileRecord, MoveRow, TagField};
use crate::progress::log_progress;
use crate::resolve::DirectoryIndex;
use crate::tags::TagStore;

/// Groups with more members than this are moved; smaller ones stay put.
pub const ALBUM_THRESHOLD: usize = 3;

const PROGRESS_INTERVAL: u64 = 100;

/// First plausible four-digit year.
pub static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// "2020-05-01" -> "2020". Text without a year yields `None`.
pub fn extract_year(text: &str) -> Option<String> {
    YEAR_PATTERN.find(text).map(|m| m.as_str().to_string())
}

/// Folder for a group. The year is appended as " (year)" unless the album
/// already ends with it.
pub fn album_folder_name(album: &str, year: Option<&str>) -> String {
    match year {
        Some(year) if !album.ends_with(&format!("({})", year)) => format!("{} ({})", album, year),
        _ => album.to_string(),
    }
}

pub struct AlbumGrouper<'a> {
    options: AlbumOptions,
    tags: &'a dyn TagStore,
    index: DirectoryIndex,
    stats: AlbumStatistics,
    /// Album folders created (or planned) during this run.
    created: FxHashSet<PathBuf>,
}

impl<'a> AlbumGrouper<'a> {
    pub fn new(options: AlbumOptions, tags: &'a dyn TagStore) -> Self {
        Self {
            options,
            tags,
            index: DirectoryIndex::new(),
            stats: AlbumStatistics::new(options.dry_run),
            created: FxHashSet::default(),
        }
    }

    /// Continue from the listings a previous pass left behind, so that
    /// renames planned under dry-run are seen here as well.
    pub fn with_index(mut self, index: DirectoryIndex) -> Self {
        self.index = index;
        self
    }

    /// Group `records`, move the large groups under `root` and optionally
    /// prune emptied source directories.
    pub fn run(mut self, root: &Path, records: Vec<FileRecord>, pb: &ProgressBar) -> AlbumStatistics {
        let groups = self.group(records, pb);
        self.stats.groups = groups.len();

        let mut sources = BTreeSet::new();
        for group in &groups {
            if group.member_files.len() > ALBUM_THRESHOLD {
                self.move_group(root, group, &mut sources);
            } else {
                debug!(
                    album = %group.normalized_album,
                    members = group.member_files.len(),
                    "album too small, leaving in place"
                );
                self.stats.left_in_place += group.member_files.len();
            }
        }

        if self.options.remove_empty {
            self.remove_empty_directories(root, sources);
        }
        self.stats
    }

    /// Bucket records by normalized (album, year). Tags are read only for
    /// records that do not carry them yet.
    pub fn group(&mut self, records: Vec<FileRecord>, pb: &ProgressBar) -> Vec<AlbumGroup> {
        let mut groups: Vec<AlbumGroup> = Vec::new();
        let mut by_key: FxHashMap<(String, Option<String>), usize> = FxHashMap::default();
        let total = records.len() as u64;

        for (i, mut record) in records.into_iter().enumerate() {
            self.stats.files_seen += 1;
            if !record.tags_loaded {
                self.load_tags(&mut record);
            }

            let album = clean_album_name(record.tag_snapshot.get(&TagField::Album).map_or("", |s| s.as_str()));
            let year = record.tag_snapshot.get(&TagField::Year).and_then(|y| extract_year(y));
            let key = (album.final_text, year);

            match by_key.get(&key) {
                Some(&idx) => groups[idx].member_files.push(record),
                None => {
                    by_key.insert(key.clone(), groups.len());
                    let (normalized_album, year) = key;
                    groups.push(AlbumGroup {
                        target_folder_name: album_folder_name(&normalized_album, year.as_deref()),
                        normalized_album,
                        year,
                        member_files: vec![record],
                    });
                }
            }

            pb.inc(1);
            log_progress("Grouping", i as u64 + 1, total, PROGRESS_INTERVAL);
        }
        groups
    }

    fn load_tags(&mut self, record: &mut FileRecord) {
        let path = record.on_disk_path(self.options.dry_run).to_path_buf();
        match self.tags.open(&path) {
            Ok(access) => read_snapshot(record, access.as_ref()),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to read tags");
                self.stats.record_error(&record.file_name(), e.to_string());
            }
        }
    }

    fn move_group(&mut self, root: &Path, group: &AlbumGroup, sources: &mut BTreeSet<PathBuf>) {
        self.stats.groups_moved += 1;
        let target = root.join(&group.target_folder_name);
        info!(
            album = %group.normalized_album,
            folder = %group.target_folder_name,
            members = group.member_files.len(),
            dry_run = self.options.dry_run,
            "grouping album"
        );

        for member in &group.member_files {
            if member.directory() == target {
                self.stats.already_in_place += 1;
                continue;
            }
            match self.move_member(root, &target, group, member) {
                Ok(()) => {
                    sources.insert(member.directory().to_path_buf());
                }
                Err(e) => {
                    warn!(file = %member.current_path.display(), error = %e, "failed to move file");
                    self.stats.record_error(&member.file_name(), e.to_string());
                }
            }
        }
    }

    fn ensure_folder(&mut self, root: &Path, target: &Path, folder: &str) -> Result<()> {
        if self.created.contains(target) || target.is_dir() {
            return Ok(());
        }
        if !self.options.dry_run {
            fs::create_dir_all(target).map_err(|e| error::fs("create directory", target, e))?;
        }
        info!(folder, dry_run = self.options.dry_run, "creating album folder");
        self.index
            .insert(root, folder)
            .map_err(|e| error::fs("list directory", root, e))?;
        self.created.insert(target.to_path_buf());
        self.stats.folders_created += 1;
        self.stats.created_folders.push(folder.to_string());
        Ok(())
    }

    fn move_member(&mut self, root: &Path, target: &Path, group: &AlbumGroup, member: &FileRecord) -> Result<()> {
        let source_dir = member.directory();
        let file_name = member.file_name();
        self.ensure_folder(root, target, &group.target_folder_name)?;
        self.index
            .load(source_dir)
            .map_err(|e| error::fs("list directory", source_dir, e))?;

        let name = self
            .index
            .claim_unique(target, &member.stem(), &member.extension, None)
            .map_err(|e| error::fs("list directory", target, e))?;
        let destination = target.join(&name);

        if !self.options.dry_run {
            if destination.exists() {
                self.index.release(target, &name);
                return Err(TidyError::DestinationExists(destination));
            }
            if let Err(e) = fs::rename(&member.current_path, &destination) {
                self.index.release(target, &name);
                return Err(error::fs("move", &member.current_path, e));
            }
        }
        self.index.release(source_dir, &file_name);

        info!(
            file = %file_name,
            destination = %name,
            folder = %group.target_folder_name,
            dry_run = self.options.dry_run,
            "moving file into album folder"
        );
        self.stats.moved += 1;
        self.stats.moves.push(MoveRow {
            file: member.current_path.display().to_string(),
            destination: name,
            folder: group.target_folder_name.clone(),
            dry_run: self.options.dry_run,
        });
        Ok(())
    }

    /// Remove source directories that the moves left completely empty,
    /// walking up through parents that empty out in turn. The root itself
    /// is never removed.
    fn remove_empty_directories(&mut self, root: &Path, sources: BTreeSet<PathBuf>) {
        for dir in sources.into_iter().rev() {
            let mut current = dir;
            while current != root && current.starts_with(root) {
                match self.index.is_empty(&current) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!(directory = %current.display(), error = %e, "failed to list directory");
                        break;
                    }
                }
                if !self.options.dry_run {
                    if let Err(e) = fs::remove_dir(&current) {
                        let e = error::fs("remove directory", &current, e);
                        warn!(error = %e, "failed to remove directory");
                        self.stats.record_error(&file_name_of(&current), e.to_string());
                        break;
                    }
                }
                info!(directory = %current.display(), dry_run = self.options.dry_run, "removing empty directory");
                if let Err(e) = self.index.remove_directory(&current) {
                    warn!(directory = %current.display(), error = %e, "failed to list parent directory");
                }
                self.stats.directories_removed += 1;
                self.stats.removed_directories.push(current.display().to_string());

                match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleanOptions;
    use crate::processor::FileProcessor;
    use crate::scan::{discover_audio_files, DEFAULT_MAX_DEPTH};
    use crate::tags::testing::MemoryTagStore;
    use std::fs::File;

    fn add(store: &MemoryTagStore, root: &Path, name: &str, album: &str, year: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(&path).unwrap();
        if !album.is_empty() {
            store.insert(&path, TagField::Album, album);
        }
        if !year.is_empty() {
            store.insert(&path, TagField::Year, year);
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn records(root: &Path) -> Vec<FileRecord> {
        discover_audio_files(root, DEFAULT_MAX_DEPTH)
            .into_iter()
            .map(FileRecord::new)
            .collect()
    }

    fn run(root: &Path, options: AlbumOptions, store: &MemoryTagStore) -> AlbumStatistics {
        AlbumGrouper::new(options, store).run(root, records(root), &ProgressBar::hidden())
    }

    fn live() -> AlbumOptions {
        AlbumOptions::default()
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("2020-05-01").as_deref(), Some("2020"));
        assert_eq!(extract_year("1999").as_deref(), Some("1999"));
        assert_eq!(extract_year("Released 1987/03"), Some("1987".to_string()));
        assert_eq!(extract_year("12021"), None);
        assert_eq!(extract_year("unknown"), None);
    }

    #[test]
    fn test_year_deduplication() {
        assert_eq!(album_folder_name("Greatest Hits (2020)", Some("2020")), "Greatest Hits (2020)");
        assert_eq!(album_folder_name("Greatest Hits", Some("2020")), "Greatest Hits (2020)");
        assert_eq!(album_folder_name("Greatest Hits (1999)", Some("2020")), "Greatest Hits (1999) (2020)");
        assert_eq!(album_folder_name("Greatest Hits", None), "Greatest Hits");
    }

    #[test]
    fn test_threshold_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for i in 1..=3 {
            add(&store, root, &format!("small{}.mp3", i), "Small", "2001");
        }
        for i in 1..=4 {
            add(&store, root, &format!("big{}.flac", i), "Big", "2020-05-01");
        }

        let stats = run(root, live(), &store);
        assert_eq!(stats.groups, 2);
        assert_eq!(stats.groups_moved, 1);
        assert_eq!(stats.moved, 4);
        assert_eq!(stats.left_in_place, 3);
        assert_eq!(stats.folders_created, 1);
        assert_eq!(
            listing(root),
            vec!["Big (2020)", "small1.mp3", "small2.mp3", "small3.mp3"]
        );
        assert_eq!(
            listing(&root.join("Big (2020)")),
            vec!["big1.flac", "big2.flac", "big3.flac", "big4.flac"]
        );
    }

    #[test]
    fn test_album_text_normalized_for_grouping() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        add(&store, root, "a/1.mp3", "Greatest Hits (2020)", "2020");
        add(&store, root, "a/2.mp3", "Greatest Hits (2020) [FLAC]", "2020");
        add(&store, root, "b/3.mp3", "  Greatest   Hits (2020)", "2020-01-01");
        add(&store, root, "b/4.mp3", "Greatest Hits (2020) www.rips.com", "2020");

        let stats = run(root, live(), &store);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.moved, 4);
        assert_eq!(
            listing(&root.join("Greatest Hits (2020)")),
            vec!["1.mp3", "2.mp3", "3.mp3", "4.mp3"]
        );
    }

    #[test]
    fn test_name_collisions_in_album_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for disc in ["cd1", "cd2"] {
            add(&store, root, &format!("{}/Intro.mp3", disc), "Live", "");
            add(&store, root, &format!("{}/Outro.mp3", disc), "Live", "");
        }

        let stats = run(root, live(), &store);
        assert_eq!(stats.moved, 4);
        assert_eq!(
            listing(&root.join("Live")),
            vec!["Intro (1).mp3", "Intro.mp3", "Outro (1).mp3", "Outro.mp3"]
        );
    }

    #[test]
    fn test_dry_run_matches_live_and_leaves_tree() {
        let build = |root: &Path| {
            let store = MemoryTagStore::new();
            for i in 1..=4 {
                add(&store, root, &format!("rips/disc/{}.mp3", i), "Album", "1999");
            }
            add(&store, root, "rips/keep/cover.mp3", "Single", "");
            store
        };
        let options = AlbumOptions {
            remove_empty: true,
            ..AlbumOptions::default()
        };

        let dry_dir = tempfile::tempdir().unwrap();
        let dry_store = build(dry_dir.path());
        let dry_stats = run(
            dry_dir.path(),
            AlbumOptions {
                dry_run: true,
                ..options
            },
            &dry_store,
        );

        let live_dir = tempfile::tempdir().unwrap();
        let live_store = build(live_dir.path());
        let live_stats = run(live_dir.path(), options, &live_store);

        assert_eq!(dry_stats.moved, live_stats.moved);
        assert_eq!(dry_stats.folders_created, live_stats.folders_created);
        assert_eq!(dry_stats.directories_removed, live_stats.directories_removed);
        assert_eq!(dry_stats.created_folders, live_stats.created_folders);
        let destinations = |s: &AlbumStatistics| -> Vec<String> {
            s.moves.iter().map(|m| format!("{}/{}", m.folder, m.destination)).collect()
        };
        assert_eq!(destinations(&dry_stats), destinations(&live_stats));

        // disc/ is emptied and removed; rips/ still holds keep/.
        assert_eq!(live_stats.directories_removed, 1);
        assert_eq!(listing(live_dir.path()), vec!["Album (1999)", "rips"]);
        assert_eq!(listing(&live_dir.path().join("rips")), vec!["keep"]);

        assert_eq!(listing(dry_dir.path()), vec!["rips"]);
        assert_eq!(listing(&dry_dir.path().join("rips/disc")).len(), 4);
    }

    #[test]
    fn test_remove_empty_cascades_but_keeps_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for i in 1..=4 {
            add(&store, root, &format!("downloads/2020/batch/{}.ogg", i), "Batch", "");
        }
        for i in 1..=4 {
            add(&store, root, &format!("{}.wav", i), "Top", "");
        }

        let options = AlbumOptions {
            remove_empty: true,
            ..AlbumOptions::default()
        };
        let stats = run(root, options, &store);
        assert_eq!(stats.moved, 8);
        assert_eq!(stats.directories_removed, 3);
        assert_eq!(listing(root), vec!["Batch", "Top"]);
        assert!(root.exists());
    }

    #[test]
    fn test_non_audio_files_keep_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for i in 1..=4 {
            add(&store, root, &format!("src/{}.mp3", i), "Album", "");
        }
        File::create(root.join("src/cover.jpg")).unwrap();

        let options = AlbumOptions {
            remove_empty: true,
            ..AlbumOptions::default()
        };
        let stats = run(root, options, &store);
        assert_eq!(stats.directories_removed, 0);
        assert_eq!(listing(&root.join("src")), vec!["cover.jpg"]);
    }

    #[test]
    fn test_rerun_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for i in 1..=4 {
            add(&store, root, &format!("{}.mp3", i), "Album", "2010");
        }
        run(root, live(), &store);

        // Tags are keyed by path, so re-register them at the new location.
        for i in 1..=4 {
            let path = root.join("Album (2010)").join(format!("{}.mp3", i));
            store.insert(&path, TagField::Album, "Album");
            store.insert(&path, TagField::Year, "2010");
        }
        let stats = run(root, live(), &store);
        assert_eq!(stats.moved, 0);
        assert_eq!(stats.already_in_place, 4);
        assert_eq!(stats.folders_created, 0);
    }

    #[test]
    fn test_tag_failure_groups_as_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for i in 1..=4 {
            add(&store, root, &format!("{}.mp3", i), "", "");
        }
        store.fail_on(&root.join("1.mp3"));

        let stats = run(root, live(), &store);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.moved, 4);
        assert_eq!(listing(root), vec!["Unknown Album"]);
    }

    #[test]
    fn test_numeric_album_titles() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for i in 1..=4 {
            add(&store, root, &format!("{}.mp3", i), "1989", "2014");
        }

        let stats = run(root, live(), &store);
        assert_eq!(stats.moved, 4);
        assert_eq!(listing(root), vec!["1989 (2014)"]);
    }

    #[test]
    fn test_album_pass_follows_cleaning_plan() {
        let plan = |dry_run: bool| -> (Vec<String>, Vec<String>, usize) {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            let store = MemoryTagStore::new();
            for name in ["01 A.mp3", "02 B.mp3", "03 C.mp3", "04 D.mp3"] {
                add(&store, root, &format!("rips/{}", name), "X", "");
            }
            let files = discover_audio_files(root, DEFAULT_MAX_DEPTH);
            let clean_options = CleanOptions {
                dry_run,
                ..CleanOptions::default()
            };
            let cleaned = FileProcessor::new(clean_options, &store).run(&files, &ProgressBar::hidden());
            assert_eq!(cleaned.stats.renamed, 4);

            let album_options = AlbumOptions {
                dry_run,
                remove_empty: true,
            };
            let stats = AlbumGrouper::new(album_options, &store)
                .with_index(cleaned.index)
                .run(root, cleaned.records, &ProgressBar::hidden());
            let sources: Vec<String> = stats.moves.iter().map(|m| file_name_of(Path::new(&m.file))).collect();
            let destinations: Vec<String> = stats.moves.iter().map(|m| format!("{}/{}", m.folder, m.destination)).collect();
            (sources, destinations, stats.directories_removed)
        };

        let live_plan = plan(false);
        let dry_plan = plan(true);
        assert_eq!(dry_plan, live_plan);
        assert_eq!(live_plan.0, vec!["A.mp3", "B.mp3", "C.mp3", "D.mp3"]);
        assert_eq!(live_plan.1, vec!["X/A.mp3", "X/B.mp3", "X/C.mp3", "X/D.mp3"]);
        assert_eq!(live_plan.2, 1);
    }

    #[test]
    fn test_destination_appearing_after_listing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for i in 1..=4 {
            add(&store, root, &format!("src/{}.mp3", i), "Album", "");
        }
        fs::create_dir(root.join("Album")).unwrap();
        let files = records(root);
        let mut index = DirectoryIndex::new();
        index.load(&root.join("Album")).unwrap();
        File::create(root.join("Album/1.mp3")).unwrap();

        let stats = AlbumGrouper::new(live(), &store)
            .with_index(index)
            .run(root, files, &ProgressBar::hidden());
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.error_log[0].file, "1.mp3");
        assert!(stats.error_log[0].message.contains("already exists"));
        assert_eq!(stats.moved, 3);
        assert_eq!(listing(&root.join("Album")), vec!["1.mp3", "2.mp3", "3.mp3", "4.mp3"]);
        assert_eq!(listing(&root.join("src")), vec!["1.mp3"]);
    }

    #[test]
    fn test_failed_move_releases_claim() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = MemoryTagStore::new();
        for name in ["a/Intro.mp3", "b/Intro.mp3", "b/Two.mp3", "b/Three.mp3"] {
            add(&store, root, name, "Live", "");
        }
        // Listed but gone before the move.
        let files = records(root);
        fs::remove_file(root.join("a/Intro.mp3")).unwrap();

        let options = AlbumOptions {
            remove_empty: true,
            ..AlbumOptions::default()
        };
        let stats = AlbumGrouper::new(options, &store).run(root, files, &ProgressBar::hidden());
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.error_log[0].file, "Intro.mp3");
        assert_eq!(stats.moved, 3);
        // The failed claim on "Intro.mp3" is gone, so the second Intro takes the plain name.
        assert_eq!(listing(&root.join("Live")), vec!["Intro.mp3", "Three.mp3", "Two.mp3"]);
        assert_eq!(stats.directories_removed, 1);
        assert!(root.join("a").is_dir());
    }
}
