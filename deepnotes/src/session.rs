//! # Note sessions
//!
//! The host side of an open note: routes pointer input to the page on screen, keeps the pen consistent
//! across pages, answers the pages' reload requests from storage, and runs saves in the background.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use deepnotes_core::{
    stroke::Pen, AllocationError, Color, DamageRect, Direction, DrawSurface, NoteId, PageSet,
    RasterSurface, SurfaceListener, Undone, Viewport,
};

use crate::{
    export::Exporter,
    store::{DeleteOutcome, NoteStore, SavedNoteManifest, StoreError},
    task,
};

/// Collects notifications from a session's pages.
///
/// Pages call in while mid-operation, so reload requests are only queued here and serviced by the session
/// once the page call returned.
#[derive(Default, Debug)]
pub struct SessionSignals {
    unsaved: AtomicBool,
    reloads: parking_lot::Mutex<Vec<usize>>,
}
impl SessionSignals {
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved.load(Ordering::Acquire)
    }
    fn set_unsaved(&self, unsaved: bool) {
        self.unsaved.store(unsaved, Ordering::Release);
    }
    fn take_reloads(&self) -> Vec<usize> {
        std::mem::take(&mut *self.reloads.lock())
    }
}
impl SurfaceListener for SessionSignals {
    fn on_changed(&self) {
        self.set_unsaved(true);
    }
    fn on_needs_reload(&self, page: usize) {
        let mut reloads = self.reloads.lock();
        if !reloads.contains(&page) {
            reloads.push(page);
        }
    }
}

pub struct NoteSession {
    /// `None` until first saved.
    note: Option<NoteId>,
    pages: PageSet,
    store: Arc<NoteStore>,
    signals: Arc<SessionSignals>,
    pen: Pen,
}
impl NoteSession {
    /// Start a new, unsaved note.
    /// # Errors
    /// If the pages cannot be allocated.
    pub fn create(store: Arc<NoteStore>, viewport: Viewport, pen: Pen) -> Result<Self, AllocationError> {
        let signals = Arc::new(SessionSignals::default());
        let pages = store.create(viewport, signals.clone())?;
        Ok(Self::with_pages(None, pages, store, signals, pen))
    }
    /// Open a persisted note.
    /// # Errors
    /// If the pages cannot be allocated. Unreadable page files are skipped.
    pub fn open(
        store: Arc<NoteStore>,
        note: NoteId,
        viewport: Viewport,
        pen: Pen,
    ) -> Result<Self, StoreError> {
        let signals = Arc::new(SessionSignals::default());
        let pages = store.load(note, viewport, signals.clone())?;
        Ok(Self::with_pages(Some(note), pages, store, signals, pen))
    }
    fn with_pages(
        note: Option<NoteId>,
        mut pages: PageSet,
        store: Arc<NoteStore>,
        signals: Arc<SessionSignals>,
        pen: Pen,
    ) -> Self {
        pages.current_page_mut().set_pen(pen);
        let pen = pages.current_page().pen();
        Self {
            note,
            pages,
            store,
            signals,
            pen,
        }
    }

    #[must_use]
    pub fn note(&self) -> Option<NoteId> {
        self.note
    }
    #[must_use]
    pub fn pages(&self) -> &PageSet {
        &self.pages
    }
    #[must_use]
    pub fn current_page(&self) -> &DrawSurface {
        self.pages.current_page()
    }
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.signals.has_unsaved_changes()
    }
    #[must_use]
    pub fn pen(&self) -> Pen {
        self.pen
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.pages.current_page_mut().begin_stroke(x, y);
    }
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<DamageRect> {
        self.pages.current_page_mut().extend_stroke(x, y)
    }
    pub fn pointer_up(&mut self) -> Option<DamageRect> {
        self.pages.current_page_mut().end_stroke()
    }
    /// Undo on the page on screen, reloading its persisted foreground if it has one.
    /// # Errors
    /// If the persisted foreground cannot be read. The page then shows only the remaining strokes.
    pub fn undo(&mut self) -> Result<Undone, StoreError> {
        let undone = self.pages.current_page_mut().undo();
        self.service_reloads()?;
        Ok(undone)
    }
    /// Answer the reload requests pages made since the last call.
    /// # Errors
    /// On the first page whose persisted foreground cannot be read. Requests after it are dropped.
    pub fn service_reloads(&mut self) -> Result<(), StoreError> {
        let reloads = self.signals.take_reloads();
        let Some(note) = self.note else {
            if !reloads.is_empty() {
                log::warn!("reload requested for an unsaved note, ignoring");
            }
            return Ok(());
        };
        for index in reloads {
            log::debug!("reloading page {index} of {note}");
            let page = match self.pages.page_at_mut(index) {
                Ok(page) => page,
                Err(e) => {
                    log::error!("{e}");
                    continue;
                }
            };
            match self.store.reload_foreground(note, index)? {
                Some(foreground) => page.load_foreground(foreground),
                None => log::debug!("page {index} of {note} has no persisted foreground"),
            }
        }
        Ok(())
    }
    /// Empty the page on screen. Its files go on the next save.
    pub fn clear(&mut self) {
        self.pages.current_page_mut().clear(false);
    }
    /// Use `photo` as the background of the page on screen.
    pub fn import_background(&mut self, photo: RasterSurface) {
        self.pages.current_page_mut().set_background(photo, true);
    }
    pub fn set_paint_color(&mut self, color: Color) {
        self.pen.color = color;
        self.pages.current_page_mut().set_paint_color(color);
    }
    pub fn set_pen_width(&mut self, width: f32) {
        self.pen.set_width(width);
        self.pages.current_page_mut().set_pen_width(width);
    }
    /// Turn the page, carrying the pen over. Returns the new 1-based page number.
    pub fn advance(&mut self, direction: Direction) -> usize {
        let number = self.pages.advance(direction);
        self.pages.current_page_mut().set_pen(self.pen);
        number
    }
    /// Flatten the page on screen for display.
    /// # Errors
    /// If the frame cannot be allocated.
    pub fn compose(&self) -> Result<RasterSurface, AllocationError> {
        self.pages.current_page().compose()
    }
    /// Drop every page's undo history to free memory.
    pub fn on_low_memory(&mut self) {
        log::info!("low memory, dropping undo history");
        self.pages.for_each_page_mut(DrawSurface::clear_undo_cache);
    }

    /// Save in the background, giving the session back once done. Does nothing if nothing changed.
    ///
    /// A note saved for the first time is assigned its identifier here.
    /// # Errors
    /// If the save task died. The session is lost along with its pages.
    pub async fn save(self) -> anyhow::Result<(Self, Option<SavedNoteManifest>)> {
        if !self.has_unsaved_changes() {
            log::debug!("nothing to save");
            return Ok((self, None));
        }
        let Self {
            note,
            pages,
            store,
            signals,
            pen,
        } = self;
        let note = note.unwrap_or_else(NoteId::now);
        signals.set_unsaved(false);

        let (pages, manifest) = task::save_in_background(store.clone(), pages, note)
            .wait()
            .await?;
        if !manifest.is_complete() {
            signals.set_unsaved(true);
        }
        Ok((
            Self {
                note: Some(note),
                pages,
                store,
                signals,
                pen,
            },
            Some(manifest),
        ))
    }
    /// Save, then flatten the note for sharing.
    /// # Errors
    /// If saving failed, or the note was never saved, or the export failed.
    pub async fn save_and_export(
        self,
        exporter: Arc<Exporter>,
    ) -> anyhow::Result<(Self, Vec<PathBuf>)> {
        let (session, manifest) = self.save().await?;
        if let Some(manifest) = &manifest {
            anyhow::ensure!(
                manifest.is_complete(),
                "saving {} failed for {} files",
                manifest.note,
                manifest.failures.len()
            );
        }
        let note = session
            .note
            .ok_or_else(|| anyhow::anyhow!("an empty note has nothing to export"))?;
        let store = session.store.clone();
        let written =
            tokio::task::spawn_blocking(move || exporter.export(&store, note)).await??;
        Ok((session, written))
    }
    /// Free the pages without saving.
    pub fn close(self) {
        if self.has_unsaved_changes() {
            log::warn!("closing a note with unsaved changes");
        }
        self.pages.release();
    }
    /// Remove the note from storage and free its pages.
    pub fn delete(self) -> Option<DeleteOutcome> {
        let outcome = self.note.map(|note| self.store.delete(note));
        self.pages.release();
        outcome
    }
}

#[cfg(test)]
mod test {
    use super::NoteSession;
    use crate::{export::Exporter, store::NoteStore};
    use deepnotes_core::{stroke::Pen, Color, Direction, Undone, Viewport};
    use std::{num::NonZeroUsize, sync::Arc};

    fn viewport() -> Viewport {
        Viewport::new(48, 48).unwrap()
    }
    fn store(dir: &tempfile::TempDir) -> Arc<NoteStore> {
        Arc::new(NoteStore::new(
            dir.path().join("notes"),
            NonZeroUsize::new(3).unwrap(),
        ))
    }
    fn line(session: &mut NoteSession, from: [f32; 2], to: [f32; 2]) {
        session.pointer_down(from[0], from[1]);
        assert!(session.pointer_move(to[0], to[1]).is_some());
        assert!(session.pointer_up().is_some());
    }

    #[tokio::test]
    async fn save_assigns_id_once() {
        crate::logging::init_test();
        let dir = tempfile::tempdir().unwrap();
        let session = NoteSession::create(store(&dir), viewport(), Pen::default()).unwrap();

        // Untouched notes aren't saved.
        let (mut session, manifest) = session.save().await.unwrap();
        assert!(manifest.is_none());
        assert!(session.note().is_none());

        line(&mut session, [4.0, 4.0], [40.0, 40.0]);
        assert!(session.has_unsaved_changes());
        let (mut session, manifest) = session.save().await.unwrap();
        let note = session.note().unwrap();
        assert_eq!(manifest.unwrap().note, note);
        assert!(!session.has_unsaved_changes());

        line(&mut session, [4.0, 40.0], [40.0, 4.0]);
        let (session, _) = session.save().await.unwrap();
        assert_eq!(session.note(), Some(note));
        session.close();
    }
    #[tokio::test]
    async fn undo_on_reopened_note_restores_persisted_ink() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut session = NoteSession::create(store.clone(), viewport(), Pen::default()).unwrap();
        line(&mut session, [4.0, 24.0], [44.0, 24.0]);
        let (session, _) = session.save().await.unwrap();
        let note = session.note().unwrap();
        let persisted = session
            .current_page()
            .foreground()
            .as_image()
            .as_raw()
            .clone();
        session.close();

        let mut session = NoteSession::open(store, note, viewport(), Pen::default()).unwrap();
        line(&mut session, [24.0, 4.0], [24.0, 44.0]);
        assert_ne!(
            session.current_page().foreground().as_image().as_raw(),
            &persisted
        );
        assert_eq!(session.undo().unwrap(), Undone::NeedsReload { remaining: 0 });
        assert_eq!(
            session.current_page().foreground().as_image().as_raw(),
            &persisted
        );
        assert_eq!(session.undo().unwrap(), Undone::Nothing);
    }
    #[tokio::test]
    async fn undo_after_save_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut session = NoteSession::create(store.clone(), viewport(), Pen::default()).unwrap();
        line(&mut session, [4.0, 24.0], [44.0, 24.0]);
        let (mut session, _) = session.save().await.unwrap();
        let note = session.note().unwrap();

        assert_eq!(session.undo().unwrap(), Undone::Replayed { remaining: 0 });
        assert!(session.current_page().foreground().is_blank());
        assert!(session.has_unsaved_changes());
        let (session, manifest) = session.save().await.unwrap();
        assert!(manifest.unwrap().is_complete());
        session.close();

        let session = NoteSession::open(store, note, viewport(), Pen::default()).unwrap();
        assert!(session.current_page().foreground().is_blank());
    }
    #[tokio::test]
    async fn cleared_page_is_deleted_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut session = NoteSession::create(store.clone(), viewport(), Pen::default()).unwrap();
        line(&mut session, [4.0, 4.0], [40.0, 4.0]);
        let (mut session, _) = session.save().await.unwrap();
        let note = session.note().unwrap();
        assert!(store.layout().foreground(note, 0).exists());

        session.clear();
        assert!(session.has_unsaved_changes());
        let (session, manifest) = session.save().await.unwrap();
        assert_eq!(manifest.unwrap().deleted.len(), 1);
        assert!(!store.layout().foreground(note, 0).exists());

        let outcome = session.delete().unwrap();
        assert!(outcome.is_complete());
        assert!(!store.exists(note));
    }
    #[test]
    fn pen_follows_page_turns() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = NoteSession::create(store(&dir), viewport(), Pen::default()).unwrap();
        let red = Color::new(255, 0, 0, 255);
        session.set_paint_color(red);
        session.set_pen_width(9.0);
        session.set_pen_width(-3.0);

        assert_eq!(session.advance(Direction::Forward), 2);
        assert_eq!(session.current_page().paint_color(), red);
        assert_eq!(session.current_page().pen_width(), 9.0);
        assert_eq!(session.advance(Direction::Backward), 1);
        assert_eq!(session.advance(Direction::Backward), 3);
        assert_eq!(session.current_page().pen(), session.pen());
    }
    #[test]
    fn low_memory_drops_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = NoteSession::create(store(&dir), viewport(), Pen::default()).unwrap();
        line(&mut session, [4.0, 4.0], [40.0, 4.0]);
        session.advance(Direction::Forward);
        line(&mut session, [4.0, 4.0], [40.0, 4.0]);
        session.on_low_memory();
        assert!(session.pages().iter().all(|page| page.history().is_empty()));
        assert_eq!(session.undo().unwrap(), Undone::Nothing);
        assert!(!session.current_page().foreground().is_blank());
    }
    #[tokio::test]
    async fn export_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Arc::new(Exporter::new(dir.path().join("share")));
        let mut session = NoteSession::create(store(&dir), viewport(), Pen::default()).unwrap();
        let frame = session.compose().unwrap();
        assert_eq!(frame.pixel(0, 0), Some(Color::WHITE));

        line(&mut session, [4.0, 4.0], [40.0, 4.0]);
        let (session, written) = session.save_and_export(exporter.clone()).await.unwrap();
        let note = session.note().unwrap();
        assert_eq!(written, vec![exporter.dir().join(format!("{note}_0.jpg"))]);
        assert!(written[0].exists());
    }
}
