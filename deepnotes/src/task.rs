//! Saving off the input thread.
//!
//! The pages are moved into the save task and handed back with its result, so nothing can draw on them
//! while their rasters are being encoded.

use std::sync::Arc;

use deepnotes_core::{NoteId, PageSet};

use crate::store::{NoteStore, SavedNoteManifest};

#[derive(thiserror::Error, Debug)]
#[error("background save of {note} did not finish: {source}")]
pub struct SaveAborted {
    pub note: NoteId,
    #[source]
    pub source: tokio::task::JoinError,
}

/// A save in flight. Await it with [`PendingSave::wait`] to get the pages back.
#[must_use = "dropping a pending save loses the pages it holds"]
pub struct PendingSave {
    note: NoteId,
    handle: tokio::task::JoinHandle<(PageSet, SavedNoteManifest)>,
}
impl PendingSave {
    #[must_use]
    pub fn note(&self) -> NoteId {
        self.note
    }
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
    /// Wait for the save, returning the pages along with what was written.
    /// # Errors
    /// If the save task panicked. The pages are lost in that case.
    pub async fn wait(self) -> Result<(PageSet, SavedNoteManifest), SaveAborted> {
        let note = self.note;
        self.handle
            .await
            .map_err(|source| SaveAborted { note, source })
    }
    /// Run `then` once the save finished, on the runtime. For chaining actions such as leaving the note
    /// only after its pages are on disk.
    pub fn on_complete<F, Fut>(self, then: F) -> tokio::task::JoinHandle<Fut::Output>
    where
        F: FnOnce(Result<(PageSet, SavedNoteManifest), SaveAborted>) -> Fut + Send + 'static,
        Fut: std::future::Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        tokio::spawn(async move { then(self.wait().await).await })
    }
}

/// Save `pages` as `note` on the blocking pool.
///
/// Must be called from within a tokio runtime.
pub fn save_in_background(store: Arc<NoteStore>, mut pages: PageSet, note: NoteId) -> PendingSave {
    log::debug!("queueing save of {note}");
    let handle = tokio::task::spawn_blocking(move || {
        let manifest = store.save(&mut pages, note);
        (pages, manifest)
    });
    PendingSave { note, handle }
}
