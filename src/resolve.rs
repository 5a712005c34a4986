//! Collision-free naming inside a directory.
//!
//! [`resolve_unique_name`] is pure: it only asks its caller whether a name is
//! taken. [`DirectoryIndex`] is the caller used by both passes. It keeps a
//! virtual listing per directory that is updated for every planned rename or
//! move, so dry-run and live runs make identical naming decisions and two
//! files in one run never claim the same unwritten name.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Compose `base.ext`, or `base (n).ext` when a counter is given.
/// An empty extension yields no trailing dot.
pub fn compose_name(base: &str, extension: &str, counter: Option<u64>) -> String {
    let stem = match counter {
        Some(n) => format!("{} ({})", base, n),
        None => base.to_string(),
    };
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// First free name among `base.ext`, `base (1).ext`, `base (2).ext`, ...
pub fn resolve_unique_name<F>(base: &str, extension: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut candidate = compose_name(base, extension, None);
    let mut counter = 0u64;
    while is_taken(&candidate) {
        counter += 1;
        candidate = compose_name(base, extension, Some(counter));
    }
    candidate
}

/// Virtual directory listings, loaded lazily from disk on first use.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    listings: FxHashMap<PathBuf, FxHashSet<String>>,
}

impl DirectoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn listing(&mut self, dir: &Path) -> io::Result<&mut FxHashSet<String>> {
        if !self.listings.contains_key(dir) {
            let names = read_names(dir)?;
            self.listings.insert(dir.to_path_buf(), names);
        }
        Ok(self.listings.entry(dir.to_path_buf()).or_default())
    }

    /// Read `dir` into the index now, so later releases are tracked even
    /// though the disk is never consulted again.
    pub fn load(&mut self, dir: &Path) -> io::Result<()> {
        self.listing(dir).map(|_| ())
    }

    pub fn contains(&mut self, dir: &Path, name: &str) -> io::Result<bool> {
        Ok(self.listing(dir)?.contains(name))
    }

    /// Resolve and reserve a unique name in `dir`. `own_name` is the file's
    /// current name when it already lives in `dir`; it never counts as taken.
    pub fn claim_unique(
        &mut self,
        dir: &Path,
        base: &str,
        extension: &str,
        own_name: Option<&str>,
    ) -> io::Result<String> {
        let listing = self.listing(dir)?;
        let name = resolve_unique_name(base, extension, |candidate| {
            own_name != Some(candidate) && listing.contains(candidate)
        });
        listing.insert(name.clone());
        Ok(name)
    }

    /// Record a name that now exists in `dir`.
    pub fn insert(&mut self, dir: &Path, name: &str) -> io::Result<()> {
        self.listing(dir)?.insert(name.to_string());
        Ok(())
    }

    /// Forget a name that no longer exists in `dir`. Only affects listings
    /// already loaded.
    pub fn release(&mut self, dir: &Path, name: &str) {
        if let Some(listing) = self.listings.get_mut(dir) {
            listing.remove(name);
        }
    }

    /// True when `dir` has no entries left in the virtual view.
    pub fn is_empty(&mut self, dir: &Path) -> io::Result<bool> {
        Ok(self.listing(dir)?.is_empty())
    }

    /// Drop a removed directory and its name in the parent listing.
    pub fn remove_directory(&mut self, dir: &Path) -> io::Result<()> {
        self.listings.remove(dir);
        if let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) {
            self.listing(parent)?.remove(&*name.to_string_lossy());
        }
        Ok(())
    }
}

/// Entry names in `dir`; a missing directory reads as empty.
fn read_names(dir: &Path) -> io::Result<FxHashSet<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FxHashSet::default()),
        Err(e) => return Err(e),
    };
    let mut names = FxHashSet::default();
    for entry in entries {
        names.insert(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
