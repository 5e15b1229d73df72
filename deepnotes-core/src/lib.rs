//! Drawing engine for handwritten notes: freehand strokes rendered into per-page rasters over an optional
//! photo background, with replay-based undo.
//!
//! Nothing in this crate performs I/O. Persistence lives with the host, see the `deepnotes` crate.

pub mod color;
pub mod note;
pub mod pages;
pub mod raster;
pub mod stroke;
pub mod surface;
pub mod viewport;

pub use color::Color;
pub use note::NoteId;
pub use pages::{Direction, PageSet};
pub use raster::{AllocationError, RasterSurface};
pub use surface::{DamageRect, DrawSurface, SurfaceListener, Undone};
pub use viewport::Viewport;
