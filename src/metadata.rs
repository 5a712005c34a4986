//! Tag normalization for a single file.

use rustc_hash::FxHashSet;

use crate::converge::clean_text;
use crate::models::{FileRecord, MetadataChange, TagField, TextKind};
use crate::tags::{TagAccess, TagError};

/// What the tag normalizer did (or would do) to one file.
#[derive(Debug, Default)]
pub struct TagNormalization {
    pub changes: Vec<MetadataChange>,
    pub extracted_tokens: FxHashSet<String>,
}

impl TagNormalization {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Clean title, artist and album in place and refresh the record's tag
/// snapshot. Values that would clean down to nothing are left as they are.
/// Under dry-run the changes are computed but nothing is written.
pub fn normalize_tags(
    record: &mut FileRecord,
    tags: &mut dyn TagAccess,
    dry_run: bool,
) -> Result<TagNormalization, TagError> {
    let mut result = TagNormalization::default();
    let file = record.file_name();

    for field in TagField::CLEANED {
        let Some(old) = tags.read_field(field) else {
            record.tag_snapshot.remove(&field);
            continue;
        };
        let kind = if field == TagField::Album {
            TextKind::AlbumTag
        } else {
            TextKind::TagValue
        };
        let cleaned = clean_text(&old, kind);

        if !cleaned.changed || cleaned.final_text.is_empty() || cleaned.final_text == old {
            record.tag_snapshot.insert(field, old);
            continue;
        }
        result.extracted_tokens.extend(cleaned.extracted_tokens);

        if !dry_run {
            tags.write_field(field, &cleaned.final_text)?;
        }
        record.tag_snapshot.insert(field, cleaned.final_text.clone());
        result.changes.push(MetadataChange {
            file: file.clone(),
            field,
            old,
            new: cleaned.final_text,
        });
    }

    match tags.read_field(TagField::Year) {
        Some(year) => {
            record.tag_snapshot.insert(TagField::Year, year);
        }
        None => {
            record.tag_snapshot.remove(&TagField::Year);
        }
    }

    if result.changed() && !dry_run {
        tags.save()?;
    }
    record.tags_loaded = true;
    Ok(result)
}

/// Load the tag snapshot without modifying anything.
pub fn read_snapshot(record: &mut FileRecord, tags: &dyn TagAccess) {
    record.tag_snapshot.clear();
    for field in [TagField::Title, TagField::Artist, TagField::Album, TagField::Year] {
        if let Some(value) = tags.read_field(field) {
            record.tag_snapshot.insert(field, value);
        }
    }
    record.tags_loaded = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::testing::MemoryTagStore;
    use crate::tags::TagStore;
    use std::path::{Path, PathBuf};

    fn setup(path: &Path) -> MemoryTagStore {
        let store = MemoryTagStore::new();
        store.insert(path, TagField::Title, "[2023] Song Title");
        store.insert(path, TagField::Artist, "Artist www.example.com");
        store.insert(path, TagField::Album, "Clean Album");
        store.insert(path, TagField::Year, "2023-04-01");
        store
    }

    #[test]
    fn test_tags_cleaned_and_saved_once() {
        let path = PathBuf::from("/music/song.mp3");
        let store = setup(&path);
        let mut record = FileRecord::new(path.clone());
        let mut tags = store.open(&path).unwrap();

        let result = normalize_tags(&mut record, tags.as_mut(), false).unwrap();
        assert_eq!(result.changes.len(), 2);
        assert_eq!(result.changes[0].field, TagField::Title);
        assert_eq!(result.changes[0].new, "Song Title");
        assert_eq!(result.changes[1].new, "Artist");
        assert!(result.extracted_tokens.contains("example.com"));

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.get(&path, TagField::Title).as_deref(), Some("Song Title"));
        assert_eq!(record.tag_snapshot[&TagField::Album], "Clean Album");
        assert_eq!(record.tag_snapshot[&TagField::Year], "2023-04-01");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let path = PathBuf::from("/music/song.mp3");
        let store = setup(&path);
        let mut record = FileRecord::new(path.clone());
        let mut tags = store.open(&path).unwrap();

        let result = normalize_tags(&mut record, tags.as_mut(), true).unwrap();
        assert_eq!(result.changes.len(), 2);
        assert_eq!(store.save_count(), 0);
        assert_eq!(store.get(&path, TagField::Title).as_deref(), Some("[2023] Song Title"));
        assert_eq!(record.tag_snapshot[&TagField::Title], "Song Title");
    }

    #[test]
    fn test_value_cleaning_to_empty_is_kept() {
        let path = PathBuf::from("/music/song.mp3");
        let store = MemoryTagStore::new();
        store.insert(&path, TagField::Title, "01 - []");
        let mut record = FileRecord::new(path.clone());
        let mut tags = store.open(&path).unwrap();

        let result = normalize_tags(&mut record, tags.as_mut(), false).unwrap();
        assert!(!result.changed());
        assert_eq!(store.save_count(), 0);
        assert_eq!(record.tag_snapshot[&TagField::Title], "01 - []");
    }

    #[test]
    fn test_path_characters_kept_in_tags() {
        let path = PathBuf::from("/music/song.mp3");
        let store = MemoryTagStore::new();
        store.insert(&path, TagField::Artist, "AC/DC");
        let mut record = FileRecord::new(path.clone());
        let mut tags = store.open(&path).unwrap();

        let result = normalize_tags(&mut record, tags.as_mut(), false).unwrap();
        assert!(!result.changed());
        assert_eq!(record.tag_snapshot[&TagField::Artist], "AC/DC");
    }

    #[test]
    fn test_unwritten_value_contributes_no_tokens() {
        let path = PathBuf::from("/music/song.mp3");
        let store = MemoryTagStore::new();
        store.insert(&path, TagField::Artist, "www.site.com");
        store.insert(&path, TagField::Title, "Song");
        let mut record = FileRecord::new(path.clone());
        let mut tags = store.open(&path).unwrap();

        let result = normalize_tags(&mut record, tags.as_mut(), false).unwrap();
        assert!(!result.changed());
        assert!(result.extracted_tokens.is_empty());
        assert_eq!(store.get(&path, TagField::Artist).as_deref(), Some("www.site.com"));
    }

    #[test]
    fn test_album_keeps_leading_numbers() {
        let path = PathBuf::from("/music/song.mp3");
        let store = MemoryTagStore::new();
        store.insert(&path, TagField::Album, "808s & Heartbreak");
        store.insert(&path, TagField::Title, "01 - Heartless");
        let mut record = FileRecord::new(path.clone());
        let mut tags = store.open(&path).unwrap();

        let result = normalize_tags(&mut record, tags.as_mut(), false).unwrap();
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].field, TagField::Title);
        assert_eq!(result.changes[0].new, "Heartless");
        assert_eq!(store.get(&path, TagField::Album).as_deref(), Some("808s & Heartbreak"));
        assert!(record.tags_loaded);
    }
}
