//! Where a note's files live under the storage root:
//!
//! ```text
//! <root>/thumbnail/<note>.jpg
//! <root>/<note>/<page>.png
//! <root>/<note>/background_<page>.jpg
//! ```

use std::path::{Path, PathBuf};

use deepnotes_core::NoteId;
use strum::IntoEnumIterator;

#[derive(strum::AsRefStr, strum::EnumIter, Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FileKind {
    Thumbnail,
    Foreground,
    Background,
}
impl FileKind {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Foreground => "png",
            Self::Thumbnail | Self::Background => "jpg",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}
impl Layout {
    const THUMBNAIL_DIR: &'static str = "thumbnail";
    const BACKGROUND_PREFIX: &'static str = "background_";

    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
    #[must_use]
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.root.join(Self::THUMBNAIL_DIR)
    }
    #[must_use]
    pub fn thumbnail(&self, note: NoteId) -> PathBuf {
        self.thumbnail_dir()
            .join(format!("{note}.{}", FileKind::Thumbnail.extension()))
    }
    /// Directory holding every page of `note`.
    #[must_use]
    pub fn note_dir(&self, note: NoteId) -> PathBuf {
        self.root.join(note.to_string())
    }
    #[must_use]
    pub fn foreground(&self, note: NoteId, page: usize) -> PathBuf {
        self.note_dir(note)
            .join(format!("{page}.{}", FileKind::Foreground.extension()))
    }
    #[must_use]
    pub fn background(&self, note: NoteId, page: usize) -> PathBuf {
        self.note_dir(note).join(format!(
            "{}{page}.{}",
            Self::BACKGROUND_PREFIX,
            FileKind::Background.extension()
        ))
    }
    /// Every file a page may have.
    pub fn page_files(&self, note: NoteId, page: usize) -> impl Iterator<Item = PathBuf> + '_ {
        FileKind::iter()
            .filter(|kind| *kind != FileKind::Thumbnail)
            .map(move |kind| self.path_of(kind, note, page))
    }
    /// Path of the given file of a page. `page` is ignored for thumbnails.
    #[must_use]
    pub fn path_of(&self, kind: FileKind, note: NoteId, page: usize) -> PathBuf {
        match kind {
            FileKind::Thumbnail => self.thumbnail(note),
            FileKind::Foreground => self.foreground(note, page),
            FileKind::Background => self.background(note, page),
        }
    }
}
