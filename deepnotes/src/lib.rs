//! Persistence and hosting for [`deepnotes_core`] notes: files on disk, background saves, sharing exports,
//! user preferences, and the session driving an open note.
#![warn(clippy::pedantic)]

pub mod export;
pub mod logging;
pub mod preferences;
pub mod session;
pub mod store;
pub mod task;

pub use export::Exporter;
pub use preferences::Preferences;
pub use session::NoteSession;
pub use store::{NoteStore, SavedNoteManifest, StoreError};
