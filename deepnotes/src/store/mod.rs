//! # Note storage
//!
//! Translates [`PageSet`]s to and from files: a lossless foreground per drawn page, a JPEG per page with a
//! photo background, and one thumbnail per note. Only what changed is written, and pages the user emptied
//! have their files removed.
//!
//! Everything here blocks on file I/O and image coding. Run it off the input thread, see [`crate::task`].

pub(crate) mod codec;
pub mod layout;

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};

use deepnotes_core::{
    surface::SurfaceListener, AllocationError, Color, DrawSurface, NoteId, PageSet, RasterSurface,
    Viewport,
};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use smallvec::SmallVec;

pub use layout::{FileKind, Layout};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("file access failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("image coding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("png encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// A file that could not be written or removed.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: StoreError,
}

/// What a [`NoteStore::save`] did. Failures do not stop the rest of the save.
#[derive(Debug)]
pub struct SavedNoteManifest {
    pub note: NoteId,
    pub written: SmallVec<[PathBuf; 4]>,
    pub deleted: SmallVec<[PathBuf; 4]>,
    pub thumbnail: Option<PathBuf>,
    pub failures: Vec<FileFailure>,
}
impl SavedNoteManifest {
    fn new(note: NoteId) -> Self {
        Self {
            note,
            written: SmallVec::new(),
            deleted: SmallVec::new(),
            thumbnail: None,
            failures: Vec::new(),
        }
    }
    /// True if every write and delete succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
    fn fail(&mut self, path: PathBuf, error: StoreError) {
        log::error!("failed to persist {}: {error}", path.display());
        self.failures.push(FileFailure { path, error });
    }
}

/// What a [`NoteStore::delete`] did. Failures do not stop the rest of the deletion.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}
impl DeleteOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Remove a file. A file that is already gone counts as removed, returns whether it existed.
fn remove_file(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Half-size preview of a page: the scaled foreground over the scaled background, or over white when the
/// page has no photo.
/// # Errors
/// If `scale` shrinks the page to nothing, or a raster cannot be allocated.
pub fn thumbnail(page: &DrawSurface, scale: f32) -> Result<RasterSurface, AllocationError> {
    let foreground = page.foreground().scaled(scale)?;
    let mut canvas = match page.background() {
        Some(background) => background.scaled(scale)?,
        None => RasterSurface::filled(foreground.width(), foreground.height(), Color::WHITE)?,
    };
    canvas.composite(&foreground, 0, 0);
    foreground.release();
    Ok(canvas)
}

pub struct NoteStore {
    layout: Layout,
    pages_per_note: NonZeroUsize,
    jpeg_quality: u8,
    thumbnail_scale: f32,
}
impl NoteStore {
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;
    pub const DEFAULT_THUMBNAIL_SCALE: f32 = 0.5;

    #[must_use]
    pub fn new(root: PathBuf, pages_per_note: NonZeroUsize) -> Self {
        Self {
            layout: Layout::new(root),
            pages_per_note,
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
            thumbnail_scale: Self::DEFAULT_THUMBNAIL_SCALE,
        }
    }
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
    #[must_use]
    pub fn with_thumbnail_scale(mut self, scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 && scale <= 1.0 {
            self.thumbnail_scale = scale;
        } else {
            log::warn!("ignoring thumbnail scale {scale}");
        }
        self
    }
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }
    #[must_use]
    pub fn pages_per_note(&self) -> NonZeroUsize {
        self.pages_per_note
    }
    #[must_use]
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
    /// Whether anything of `note` is on disk.
    #[must_use]
    pub fn exists(&self, note: NoteId) -> bool {
        self.layout.note_dir(note).exists() || self.layout.thumbnail(note).exists()
    }
    /// A blank note of the configured length.
    /// # Errors
    /// If a page raster cannot be allocated.
    pub fn create(
        &self,
        viewport: Viewport,
        listener: Arc<dyn SurfaceListener>,
    ) -> Result<PageSet, AllocationError> {
        PageSet::new(self.pages_per_note, viewport, listener)
    }

    fn write_png(&self, manifest: &mut SavedNoteManifest, surface: &RasterSurface, path: PathBuf) -> bool {
        match create_parent(&path)
            .map_err(StoreError::from)
            .and_then(|()| codec::write_png(surface, &path))
        {
            Ok(()) => {
                manifest.written.push(path);
                true
            }
            Err(e) => {
                manifest.fail(path, e);
                false
            }
        }
    }
    fn write_jpeg(&self, manifest: &mut SavedNoteManifest, surface: &RasterSurface, path: PathBuf) -> bool {
        match create_parent(&path)
            .map_err(StoreError::from)
            .and_then(|()| codec::write_jpeg(surface, &path, self.jpeg_quality))
        {
            Ok(()) => {
                manifest.written.push(path);
                true
            }
            Err(e) => {
                manifest.fail(path, e);
                false
            }
        }
    }
    fn remove(manifest: &mut SavedNoteManifest, path: PathBuf) -> bool {
        match remove_file(&path) {
            Ok(true) => {
                manifest.deleted.push(path);
                true
            }
            Ok(false) => true,
            Err(e) => {
                manifest.fail(path, e.into());
                false
            }
        }
    }

    /// Persist every page's pending changes as `note`.
    ///
    /// Modified foregrounds and backgrounds are written, pages in delete status have their files removed,
    /// and the thumbnail is refreshed if the first page changed in any way. Pages whose files were all
    /// handled successfully are marked saved, pages with failures stay dirty for the next attempt.
    ///
    /// Rasters are only read, a failed save never touches them.
    pub fn save(&self, pages: &mut PageSet, note: NoteId) -> SavedNoteManifest {
        let mut manifest = SavedNoteManifest::new(note);

        let first = &pages[0];
        if first.is_dirty() {
            let path = self.layout.thumbnail(note);
            match thumbnail(first, self.thumbnail_scale) {
                Ok(thumb) => {
                    if self.write_jpeg(&mut manifest, &thumb, path.clone()) {
                        manifest.thumbnail = Some(path);
                    }
                }
                Err(e) => manifest.fail(path, e.into()),
            }
        }

        for page in pages.iter_mut() {
            let index = page.index();
            let mut ok = true;
            if page.is_foreground_modified() {
                ok &= self.write_png(
                    &mut manifest,
                    page.foreground(),
                    self.layout.foreground(note, index),
                );
            }
            if page.is_background_modified() {
                if let Some(background) = page.background() {
                    ok &= self.write_jpeg(
                        &mut manifest,
                        background,
                        self.layout.background(note, index),
                    );
                }
            }
            if page.delete_status() {
                log::debug!("page {index} of {note} was cleared, removing its files");
                for path in self.layout.page_files(note, index) {
                    ok &= Self::remove(&mut manifest, path);
                }
            }
            if ok {
                page.mark_saved();
            }
        }

        log::info!(
            "saved {note}: {} written, {} deleted, {} failed",
            manifest.written.len(),
            manifest.deleted.len(),
            manifest.failures.len()
        );
        manifest
    }

    /// Read one persisted file, logging and discarding anything unreadable.
    fn read_lenient(path: &Path) -> Option<RasterSurface> {
        match codec::read_if_present(path) {
            Ok(surface) => surface,
            Err(e) => {
                log::warn!("ignoring unreadable {}: {e}", path.display());
                None
            }
        }
    }

    /// Load `note`. Pages without files stay blank and fresh, unreadable files are logged and skipped.
    /// # Errors
    /// If a page raster cannot be allocated.
    pub fn load(
        &self,
        note: NoteId,
        viewport: Viewport,
        listener: Arc<dyn SurfaceListener>,
    ) -> Result<PageSet, StoreError> {
        let mut pages = self.create(viewport, listener)?;
        if !self.layout.note_dir(note).exists() {
            log::warn!("{note} has no pages on disk");
            return Ok(pages);
        }

        let decoded: Vec<_> = (0..pages.capacity())
            .into_par_iter()
            .map(|index| {
                (
                    Self::read_lenient(&self.layout.foreground(note, index)),
                    Self::read_lenient(&self.layout.background(note, index)),
                )
            })
            .collect();

        for (page, (foreground, background)) in pages.iter_mut().zip(decoded) {
            if let Some(background) = background {
                page.set_background(background, false);
            }
            if let Some(foreground) = foreground {
                page.load_foreground(foreground);
            }
        }
        log::debug!("loaded {note}");
        Ok(pages)
    }

    /// Re-read one page's persisted foreground, for undo on a loaded page.
    /// # Errors
    /// If the file exists but cannot be read.
    pub fn reload_foreground(
        &self,
        note: NoteId,
        page: usize,
    ) -> Result<Option<RasterSurface>, StoreError> {
        codec::read_if_present(&self.layout.foreground(note, page))
    }

    /// Remove every file of `note`: pages, backgrounds, the note directory, and finally the thumbnail.
    /// Keeps going past failures.
    pub fn delete(&self, note: NoteId) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        let fail = |outcome: &mut DeleteOutcome, path: PathBuf, error: std::io::Error| {
            log::error!("failed to delete {}: {error}", path.display());
            outcome.failures.push(FileFailure {
                path,
                error: error.into(),
            });
        };

        let dir = self.layout.note_dir(note);
        match std::fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries {
                    match entry {
                        Ok(entry) => {
                            let path = entry.path();
                            match remove_file(&path) {
                                Ok(_) => outcome.removed.push(path),
                                Err(e) => fail(&mut outcome, path, e),
                            }
                        }
                        Err(e) => fail(&mut outcome, dir.clone(), e),
                    }
                }
                match std::fs::remove_dir(&dir) {
                    Ok(()) => outcome.removed.push(dir),
                    Err(e) => fail(&mut outcome, dir, e),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
            Err(e) => fail(&mut outcome, dir, e),
        }

        // Last, so a partially deleted note still shows up in listings.
        let thumbnail = self.layout.thumbnail(note);
        match remove_file(&thumbnail) {
            Ok(true) => outcome.removed.push(thumbnail),
            Ok(false) => (),
            Err(e) => fail(&mut outcome, thumbnail, e),
        }

        log::info!(
            "deleted {note}: {} removed, {} failed",
            outcome.removed.len(),
            outcome.failures.len()
        );
        outcome
    }
}
