//! Flattened exports for sharing a note with other applications.
//!
//! Every drawn page of a saved note is composited over its photo (or white) and written as a JPEG into a
//! cache directory the host hands to whatever does the sharing. The cache is emptied whenever it grows past
//! its limit.

use std::path::{Path, PathBuf};

use deepnotes_core::{Color, NoteId, RasterSurface};

use crate::store::{codec, NoteStore, StoreError};

pub struct Exporter {
    dir: PathBuf,
    cache_limit: u64,
    jpeg_quality: u8,
}
impl Exporter {
    pub const DEFAULT_CACHE_LIMIT: u64 = 2 * 1024 * 1024;

    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            cache_limit: Self::DEFAULT_CACHE_LIMIT,
            jpeg_quality: NoteStore::DEFAULT_JPEG_QUALITY,
        }
    }
    #[must_use]
    pub fn with_cache_limit(mut self, bytes: u64) -> Self {
        self.cache_limit = bytes;
        self
    }
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
    /// Total size of the files in the cache, in bytes. A missing cache is empty.
    /// # Errors
    /// If the cache directory cannot be listed.
    pub fn cache_size(&self) -> std::io::Result<u64> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut total = 0;
        for entry in entries {
            let metadata = entry?.metadata()?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }
    /// Remove every file in the cache. Returns how many were removed.
    /// # Errors
    /// If the cache cannot be listed or a file cannot be removed.
    pub fn clear_cache(&self) -> std::io::Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        log::debug!("cleared {removed} exported files from {}", self.dir.display());
        Ok(removed)
    }
    fn trim_cache(&self) {
        match self.cache_size() {
            Ok(size) if size > self.cache_limit => {
                log::info!(
                    "export cache holds {}, over the {} limit",
                    human_bytes::human_bytes(size as f64),
                    human_bytes::human_bytes(self.cache_limit as f64)
                );
                if let Err(e) = self.clear_cache() {
                    log::warn!("failed to clear export cache: {e}");
                }
            }
            Ok(_) => (),
            Err(e) => log::warn!("failed to measure export cache: {e}"),
        }
    }

    /// Flatten every drawn page of the persisted `note` into `<note>_<n>.jpg`, numbering from zero in page
    /// order. Pages that were never drawn on are skipped. Returns the written files.
    /// # Errors
    /// If a page cannot be read or an export cannot be written.
    pub fn export(&self, store: &NoteStore, note: NoteId) -> Result<Vec<PathBuf>, StoreError> {
        self.trim_cache();
        std::fs::create_dir_all(&self.dir)?;

        let layout = store.layout();
        let mut written = Vec::new();
        for page in 0..store.pages_per_note().get() {
            let Some(foreground) = codec::read_if_present(&layout.foreground(note, page))? else {
                continue;
            };
            let mut flat = match codec::read_if_present(&layout.background(note, page))? {
                Some(background) => background,
                None => {
                    RasterSurface::filled(foreground.width(), foreground.height(), Color::WHITE)?
                }
            };
            flat.composite(&foreground, 0, 0);
            foreground.release();

            let path = self.dir.join(format!("{note}_{}.jpg", written.len()));
            codec::write_jpeg(&flat, &path, self.jpeg_quality)?;
            written.push(path);
        }
        log::info!("exported {} pages of {note}", written.len());
        Ok(written)
    }
}

#[cfg(test)]
mod test {
    use super::Exporter;
    use crate::store::NoteStore;
    use deepnotes_core::{surface::Unobserved, Color, NoteId, RasterSurface, Viewport};
    use std::{num::NonZeroUsize, sync::Arc};

    fn saved_note(store: &NoteStore, note: NoteId) {
        let viewport = Viewport::new(40, 30).unwrap();
        let mut pages = store.create(viewport, Arc::new(Unobserved)).unwrap();
        // Page 0 drawn, page 1 photo only, page 2 drawn over a photo.
        pages[0].begin_stroke(5.0, 5.0);
        pages[0].extend_stroke(30.0, 20.0);
        pages[0].end_stroke();
        pages[1].set_background(RasterSurface::filled(40, 30, Color::BLACK).unwrap(), true);
        pages[2].set_background(RasterSurface::filled(40, 30, Color::BLACK).unwrap(), true);
        pages[2].begin_stroke(5.0, 5.0);
        pages[2].end_stroke();
        assert!(store.save(&mut pages, note).is_complete());
    }

    #[test]
    fn exports_drawn_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::new(dir.path().join("notes"), NonZeroUsize::new(3).unwrap());
        let note = NoteId::from_millis(42);
        saved_note(&store, note);

        let exporter = Exporter::new(dir.path().join("share"));
        let written = exporter.export(&store, note).unwrap();
        assert_eq!(
            written,
            vec![
                exporter.dir().join("42_0.jpg"),
                exporter.dir().join("42_1.jpg")
            ]
        );
        let first = image::open(&written[0]).unwrap().into_rgb8();
        // Undrawn area over white.
        assert!(first.get_pixel(38, 2).0.iter().all(|&c| c > 240));
        let second = image::open(&written[1]).unwrap().into_rgb8();
        assert!(second.get_pixel(38, 28).0.iter().all(|&c| c < 15));
    }
    #[test]
    fn oversized_cache_is_emptied() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::new(dir.path().join("notes"), NonZeroUsize::new(3).unwrap());
        let note = NoteId::from_millis(43);
        saved_note(&store, note);

        let exporter = Exporter::new(dir.path().join("share")).with_cache_limit(16);
        std::fs::create_dir_all(exporter.dir()).unwrap();
        let stale = exporter.dir().join("stale.jpg");
        std::fs::write(&stale, [0u8; 64]).unwrap();

        exporter.export(&store, note).unwrap();
        assert!(!stale.exists());
        assert!(exporter.cache_size().unwrap() > 0);

        assert_eq!(exporter.clear_cache().unwrap(), 2);
        assert_eq!(exporter.cache_size().unwrap(), 0);
    }
    #[test]
    fn missing_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path().join("nowhere"));
        assert_eq!(exporter.cache_size().unwrap(), 0);
        assert_eq!(exporter.clear_cache().unwrap(), 0);
    }
}
