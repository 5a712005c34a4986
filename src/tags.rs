//! Tag access for audio containers.
//!
//! The rest of the crate only sees the [`TagStore`] and [`TagAccess`] traits,
//! so the passes can be exercised against an in-memory store in tests.
//! [`FileTagStore`] is the production store and dispatches on the file
//! extension to a [`TagBackend`].

use lofty::config::{ParseOptions, ParsingMode, WriteOptions};
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::TagField;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("failed to read tags from {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to write tags to {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("no tag backend for .{extension} files")]
    Unsupported { extension: String },
}

/// Read/write access to the tags of one open file.
pub trait TagAccess {
    /// `None` when the field is absent or blank.
    fn read_field(&self, field: TagField) -> Option<String>;

    /// Stage a new value; nothing reaches disk until [`TagAccess::save`].
    fn write_field(&mut self, field: TagField, value: &str) -> Result<(), TagError>;

    /// Persist staged writes. A no-op when nothing was staged.
    fn save(&mut self) -> Result<(), TagError>;
}

/// Opens files for tag access.
pub trait TagStore {
    fn open(&self, path: &Path) -> Result<Box<dyn TagAccess>, TagError>;
}

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Container family a file extension maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBackend {
    /// ID3v2, Vorbis comments, MP4 ilst, RIFF INFO and APE, all through lofty.
    Lofty,
    /// Recognized as audio but no writable tag format.
    Unsupported,
}

impl TagBackend {
    pub fn for_extension(extension: &str) -> TagBackend {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" | "flac" | "wav" | "aac" | "ogg" | "m4a" | "opus" | "alac" | "aiff" => {
                TagBackend::Lofty
            }
            _ => TagBackend::Unsupported,
        }
    }
}

/// Production store backed by the files on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTagStore;

impl TagStore for FileTagStore {
    fn open(&self, path: &Path) -> Result<Box<dyn TagAccess>, TagError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match TagBackend::for_extension(extension) {
            TagBackend::Lofty => Ok(Box::new(LoftyTags::open(path)?)),
            TagBackend::Unsupported => Err(TagError::Unsupported {
                extension: extension.to_ascii_lowercase(),
            }),
        }
    }
}

// ============================================================================
// LOFTY BACKEND
// ============================================================================

/// The primary tag of one file, or an empty tag of the primary type when the
/// file carries none yet.
pub struct LoftyTags {
    path: PathBuf,
    tag: Tag,
    dirty: bool,
}

impl LoftyTags {
    pub fn open(path: &Path) -> Result<Self, TagError> {
        let read_error = |e: lofty::error::LoftyError| TagError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let tagged_file = Probe::open(path)
            .map_err(read_error)?
            .options(ParseOptions::new().parsing_mode(ParsingMode::BestAttempt))
            .read()
            .map_err(read_error)?;

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .cloned()
            .unwrap_or_else(|| Tag::new(tagged_file.primary_tag_type()));

        Ok(Self {
            path: path.to_path_buf(),
            tag,
            dirty: false,
        })
    }

    fn recording_date(&self) -> Option<String> {
        self.tag
            .items()
            .filter(|item| matches!(item.key(), ItemKey::RecordingDate | ItemKey::Year))
            .find_map(|item| item.value().text().map(str::to_string))
            .or_else(|| self.tag.year().map(|y| y.to_string()))
    }
}

impl TagAccess for LoftyTags {
    fn read_field(&self, field: TagField) -> Option<String> {
        let value = match field {
            TagField::Title => self.tag.title().map(|v| v.into_owned()),
            TagField::Artist => self.tag.artist().map(|v| v.into_owned()),
            TagField::Album => self.tag.album().map(|v| v.into_owned()),
            TagField::Year => self.recording_date(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn write_field(&mut self, field: TagField, value: &str) -> Result<(), TagError> {
        let value = value.to_string();
        match field {
            TagField::Title => self.tag.set_title(value),
            TagField::Artist => self.tag.set_artist(value),
            TagField::Album => self.tag.set_album(value),
            TagField::Year => {
                self.tag.insert_text(ItemKey::RecordingDate, value);
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn save(&mut self) -> Result<(), TagError> {
        if !self.dirty {
            return Ok(());
        }
        self.tag
            .save_to_path(&self.path, WriteOptions::default())
            .map_err(|e| TagError::Write {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        self.dirty = false;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================
