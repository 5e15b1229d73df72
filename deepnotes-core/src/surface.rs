//! # Draw surfaces
//!
//! One page of a note: a foreground ink raster, an optional background photo, the stroke in progress, and a
//! replay log of committed strokes for undo. Tracks which layers need writing and whether the page was
//! explicitly emptied, which drives what the persistence layer does on save.
//!
//! All operations here are synchronous and perform no I/O, they run on the input path.

use std::sync::Arc;

use crate::{
    color::Color,
    raster::{AllocationError, RasterSurface},
    stroke::{Pen, StrokeBuilder, StrokePath},
    viewport::Viewport,
};

/// Receives notifications from [`DrawSurface`]s. Injected at construction.
///
/// Implementations must not call back into the notifying surface, as it is mid-operation. Queue the request
/// and act on it after the call returns.
pub trait SurfaceListener: Send + Sync {
    /// A stroke was started, the background was replaced by the user, or the page was cleared.
    fn on_changed(&self);
    /// Undo on a previously persisted page. The persisted foreground of `page` should be fetched and passed
    /// to [`DrawSurface::load_foreground`].
    fn on_needs_reload(&self, page: usize);
}

/// A listener that ignores everything.
#[derive(Copy, Clone, Default, Debug)]
pub struct Unobserved;
impl SurfaceListener for Unobserved {
    fn on_changed(&self) {}
    fn on_needs_reload(&self, _: usize) {}
}

/// Region of a surface that must be repainted, as inclusive-exclusive `[left, right) x [top, bottom)`.
/// May extend past the surface edges.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct DamageRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}
impl DamageRect {
    /// Padding around a freshly drawn segment, covering the pen width and curve overshoot.
    pub const MARGIN: f32 = 50.0;
    /// Bounding box of the segment `a -> b`, grown by `margin` on every side.
    #[must_use]
    pub fn around_segment(a: [f32; 2], b: [f32; 2], margin: f32) -> Self {
        Self {
            left: (a[0].min(b[0]) - margin) as i32,
            top: (a[1].min(b[1]) - margin) as i32,
            right: (a[0].max(b[0]) + margin) as i32,
            bottom: (a[1].max(b[1]) + margin) as i32,
        }
    }
    /// The whole of `viewport`.
    #[must_use]
    pub fn full(viewport: Viewport) -> Self {
        Self {
            left: 0,
            top: 0,
            right: i32::try_from(viewport.width()).unwrap_or(i32::MAX),
            bottom: i32::try_from(viewport.height()).unwrap_or(i32::MAX),
        }
    }
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.left..self.right).contains(&x) && (self.top..self.bottom).contains(&y)
    }
}

/// Result of [`DrawSurface::undo`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Undone {
    /// History was empty, nothing changed.
    Nothing,
    /// The foreground was rebuilt from the remaining `remaining` strokes.
    Replayed { remaining: usize },
    /// As `Replayed`, but the page was loaded from storage, so the persisted foreground must be reloaded
    /// beneath the replayed strokes. The listener was notified.
    NeedsReload { remaining: usize },
}

pub struct DrawSurface {
    index: usize,
    viewport: Viewport,
    foreground: RasterSurface,
    background: Option<RasterSurface>,
    current: Option<StrokeBuilder>,
    history: Vec<StrokePath>,
    pen: Pen,
    foreground_modified: bool,
    background_modified: bool,
    cleared: bool,
    /// Never populated from storage.
    fresh: bool,
    listener: Arc<dyn SurfaceListener>,
}
impl DrawSurface {
    /// Create a blank page at position `index` of its note.
    /// # Errors
    /// If the foreground raster cannot be allocated.
    pub fn new(
        index: usize,
        viewport: Viewport,
        listener: Arc<dyn SurfaceListener>,
    ) -> Result<Self, AllocationError> {
        Ok(Self {
            index,
            viewport,
            foreground: RasterSurface::for_viewport(viewport)?,
            background: None,
            current: None,
            history: Vec::new(),
            pen: Pen::default(),
            foreground_modified: false,
            background_modified: false,
            cleared: false,
            fresh: true,
            listener,
        })
    }
    /// Start a new stroke at `(x, y)`. An unfinished stroke is discarded.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        if self.current.is_some() {
            log::trace!("page {}: discarding unfinished stroke", self.index);
        }
        self.current = Some(StrokeBuilder::begin(x, y));
        self.foreground_modified = true;
        self.listener.on_changed();
    }
    /// Extend the current stroke towards `(x, y)`, returning the region needing a repaint.
    /// No-op returning `None` if no stroke is in progress.
    pub fn extend_stroke(&mut self, x: f32, y: f32) -> Option<DamageRect> {
        let current = self.current.as_mut()?;
        let previous = current.extend(x, y);
        Some(DamageRect::around_segment(
            previous,
            [x, y],
            DamageRect::MARGIN,
        ))
    }
    /// Commit the current stroke into the foreground and the undo history.
    /// Returns the region needing a repaint (the whole surface), or `None` if no stroke was in progress.
    pub fn end_stroke(&mut self) -> Option<DamageRect> {
        let stroke = self.current.take()?.finish(self.pen);
        stroke.render_onto(&mut self.foreground);
        self.history.push(stroke);
        Some(DamageRect::full(self.viewport))
    }
    /// Whether a stroke is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }
    /// Forget the newest committed stroke, rebuilding the foreground from the rest of the history.
    /// The foreground counts as modified afterwards, even on a page that was just saved.
    pub fn undo(&mut self) -> Undone {
        if self.history.is_empty() {
            return Undone::Nothing;
        }
        self.foreground.clear();
        self.history.pop();
        self.replay_history();
        self.foreground_modified = true;
        self.listener.on_changed();

        let remaining = self.history.len();
        log::debug!(
            "page {}: undo, replayed {remaining} strokes",
            self.index
        );
        if self.fresh {
            Undone::Replayed { remaining }
        } else {
            self.listener.on_needs_reload(self.index);
            Undone::NeedsReload { remaining }
        }
    }
    /// Render every history entry, oldest first, over the current foreground.
    fn replay_history(&mut self) {
        for stroke in &self.history {
            stroke.render_onto(&mut self.foreground);
        }
    }
    /// Empty the foreground.
    ///
    /// With `from_undo == false` this is the user emptying the page: the background and history are dropped
    /// and the page is marked for deletion until something new is drawn or imported.
    /// With `from_undo == true` only the foreground is reset, and a reload is requested for persisted pages.
    ///
    /// Returns whether the listener was asked to reload this page.
    pub fn clear(&mut self, from_undo: bool) -> bool {
        self.foreground.clear();
        if from_undo {
            if self.fresh {
                false
            } else {
                self.listener.on_needs_reload(self.index);
                true
            }
        } else {
            self.current = None;
            if let Some(background) = self.background.take() {
                background.release();
            }
            self.history.clear();
            self.cleared = true;
            self.foreground_modified = false;
            self.background_modified = false;
            self.listener.on_changed();
            false
        }
    }
    /// Replace the background photo. `modified` is false when restoring from storage, true for user imports.
    pub fn set_background(&mut self, surface: RasterSurface, modified: bool) {
        if surface.size() != self.viewport.size() {
            log::debug!(
                "page {}: background is {:?}, viewport is {:?}",
                self.index,
                surface.size(),
                self.viewport.size()
            );
        }
        if let Some(old) = self.background.replace(surface) {
            old.release();
        }
        self.background_modified = modified;
        if modified {
            self.listener.on_changed();
        }
    }
    /// Restore a persisted foreground: the foreground becomes `surface`, with the in-memory history replayed
    /// over it. Marks the page as loaded from storage. Does not mark anything as modified.
    pub fn load_foreground(&mut self, surface: RasterSurface) {
        if surface.size() == self.foreground.size() {
            self.foreground
                .image_mut()
                .copy_from_slice(surface.as_image().as_raw());
        } else {
            log::debug!(
                "page {}: foreground is {:?}, viewport is {:?}",
                self.index,
                surface.size(),
                self.viewport.size()
            );
            self.foreground.clear();
            self.foreground.composite(&surface, 0, 0);
        }
        surface.release();
        self.replay_history();
        self.fresh = false;
    }
    /// Drop the undo history, keeping the rasters as they are.
    pub fn clear_undo_cache(&mut self) {
        self.history.clear();
        self.history.shrink_to_fit();
    }
    /// Record that all pending changes have been persisted (or the page's files deleted).
    pub fn mark_saved(&mut self) {
        self.foreground_modified = false;
        self.background_modified = false;
        self.cleared = false;
    }
    /// Flatten the page as it should be presented: white, then background, foreground, and the stroke in
    /// progress.
    /// # Errors
    /// If the output raster cannot be allocated.
    pub fn compose(&self) -> Result<RasterSurface, AllocationError> {
        let mut frame =
            RasterSurface::filled(self.viewport.width(), self.viewport.height(), Color::WHITE)?;
        if let Some(background) = &self.background {
            frame.composite(background, 0, 0);
        }
        frame.composite(&self.foreground, 0, 0);
        if let Some(current) = &self.current {
            current.render_onto(self.pen, &mut frame);
        }
        Ok(frame)
    }
    /// Free both rasters.
    pub fn release(self) {
        log::trace!("releasing page {}", self.index);
        self.foreground.release();
        if let Some(background) = self.background {
            background.release();
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
    #[must_use]
    pub fn foreground(&self) -> &RasterSurface {
        &self.foreground
    }
    #[must_use]
    pub fn background(&self) -> Option<&RasterSurface> {
        self.background.as_ref()
    }
    #[must_use]
    pub fn history(&self) -> &[StrokePath] {
        &self.history
    }
    #[must_use]
    pub fn is_foreground_modified(&self) -> bool {
        self.foreground_modified
    }
    #[must_use]
    pub fn is_background_modified(&self) -> bool {
        self.background_modified
    }
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }
    /// Whether this page's persisted files should be removed: it was cleared, and nothing was drawn or
    /// imported since.
    #[must_use]
    pub fn delete_status(&self) -> bool {
        self.cleared && !self.foreground_modified && !self.background_modified
    }
    /// Any persisted state out of date.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.foreground_modified || self.background_modified || self.delete_status()
    }
    #[must_use]
    pub fn pen(&self) -> Pen {
        self.pen
    }
    pub fn set_pen(&mut self, pen: Pen) {
        self.pen.color = pen.color;
        self.pen.set_width(pen.width);
    }
    #[must_use]
    pub fn paint_color(&self) -> Color {
        self.pen.color
    }
    pub fn set_paint_color(&mut self, color: Color) {
        self.pen.color = color;
    }
    #[must_use]
    pub fn pen_width(&self) -> f32 {
        self.pen.width
    }
    pub fn set_pen_width(&mut self, width: f32) {
        self.pen.set_width(width);
    }
}
impl std::fmt::Debug for DrawSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawSurface")
            .field("index", &self.index)
            .field("viewport", &self.viewport)
            .field("has_background", &self.background.is_some())
            .field("drawing", &self.current.is_some())
            .field("history", &self.history.len())
            .field("foreground_modified", &self.foreground_modified)
            .field("background_modified", &self.background_modified)
            .field("cleared", &self.cleared)
            .field("fresh", &self.fresh)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::{DamageRect, DrawSurface, SurfaceListener, Undone, Unobserved};
    use crate::{color::Color, raster::RasterSurface, viewport::Viewport};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Default)]
    struct Counting {
        changed: AtomicUsize,
        reloads: AtomicUsize,
    }
    impl SurfaceListener for Counting {
        fn on_changed(&self) {
            self.changed.fetch_add(1, Ordering::Relaxed);
        }
        fn on_needs_reload(&self, _: usize) {
            self.reloads.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn viewport() -> Viewport {
        Viewport::new(100, 80).unwrap()
    }
    fn blank() -> DrawSurface {
        DrawSurface::new(0, viewport(), Arc::new(Unobserved)).unwrap()
    }
    fn stroke(surface: &mut DrawSurface, from: [f32; 2], to: [f32; 2]) {
        surface.begin_stroke(from[0], from[1]);
        surface.extend_stroke(to[0], to[1]);
        surface.end_stroke();
    }
    fn same_pixels(a: &RasterSurface, b: &RasterSurface) -> bool {
        a.as_image().as_raw() == b.as_image().as_raw()
    }

    #[test]
    fn undo_every_stroke_leaves_blank() {
        let mut surface = blank();
        for i in 0..5u8 {
            let offset = f32::from(i) * 10.0;
            stroke(&mut surface, [offset, offset], [offset + 15.0, offset + 5.0]);
        }
        assert_eq!(surface.history().len(), 5);
        for remaining in (0..5).rev() {
            assert_eq!(surface.undo(), Undone::Replayed { remaining });
        }
        assert!(surface.history().is_empty());
        assert!(same_pixels(
            surface.foreground(),
            &RasterSurface::for_viewport(viewport()).unwrap()
        ));
        // One more is harmless.
        assert_eq!(surface.undo(), Undone::Nothing);
        assert!(surface.history().is_empty());
    }
    #[test]
    fn raster_depends_only_on_history() {
        let mut direct = blank();
        stroke(&mut direct, [10.0, 10.0], [40.0, 30.0]);
        stroke(&mut direct, [20.0, 50.0], [60.0, 10.0]);

        let mut churned = blank();
        stroke(&mut churned, [10.0, 10.0], [40.0, 30.0]);
        churned.set_paint_color(Color::new(255, 0, 0, 128));
        stroke(&mut churned, [0.0, 0.0], [99.0, 79.0]);
        stroke(&mut churned, [5.0, 70.0], [90.0, 75.0]);
        churned.undo();
        churned.undo();
        churned.set_paint_color(Color::BLACK);
        stroke(&mut churned, [20.0, 50.0], [60.0, 10.0]);

        assert_eq!(churned.history().len(), 2);
        assert!(same_pixels(direct.foreground(), churned.foreground()));
    }
    #[test]
    fn two_strokes_two_undos() {
        let mut surface = blank();
        stroke(&mut surface, [10.0, 10.0], [20.0, 20.0]);
        let mut only_a = RasterSurface::for_viewport(viewport()).unwrap();
        surface.history()[0].render_onto(&mut only_a);

        stroke(&mut surface, [50.0, 50.0], [60.0, 60.0]);
        assert_eq!(surface.foreground().pixel(55, 55).map(Color::alpha), Some(255));

        surface.undo();
        assert_eq!(surface.history().len(), 1);
        assert!(same_pixels(surface.foreground(), &only_a));
        assert_eq!(surface.foreground().pixel(55, 55), Some(Color::TRANSPARENT));
        assert_eq!(surface.foreground().pixel(12, 12), Some(Color::BLACK));

        surface.undo();
        assert!(surface.history().is_empty());
        assert!(surface.foreground().is_blank());
    }
    #[test]
    fn clear_then_stroke_cancels_delete() {
        let mut surface = blank();
        stroke(&mut surface, [1.0, 1.0], [30.0, 30.0]);
        assert!(!surface.delete_status());

        surface.clear(false);
        assert!(surface.delete_status());
        assert!(surface.foreground().is_blank());
        assert!(surface.history().is_empty());

        surface.begin_stroke(5.0, 5.0);
        surface.end_stroke();
        assert!(!surface.delete_status());
        // Cleared itself is sticky.
        assert!(surface.is_cleared());
    }
    #[test]
    fn clear_then_background_cancels_delete() {
        let mut surface = blank();
        surface.clear(false);
        surface.set_background(RasterSurface::filled(100, 80, Color::WHITE).unwrap(), false);
        // A background restored from storage is not an edit.
        assert!(surface.delete_status());
        surface.set_background(RasterSurface::filled(100, 80, Color::WHITE).unwrap(), true);
        assert!(!surface.delete_status());
    }
    #[test]
    fn clear_drops_background_and_progress() {
        let mut surface = blank();
        surface.set_background(RasterSurface::filled(100, 80, Color::WHITE).unwrap(), true);
        surface.begin_stroke(3.0, 3.0);
        surface.clear(false);
        assert!(surface.background().is_none());
        assert!(!surface.is_drawing());
        assert!(!surface.is_background_modified());
        assert_eq!(surface.end_stroke(), None);
    }
    #[test]
    fn stray_events_are_ignored() {
        let listener = Arc::new(Counting::default());
        let mut surface = DrawSurface::new(0, viewport(), listener.clone()).unwrap();
        assert_eq!(surface.extend_stroke(10.0, 10.0), None);
        assert_eq!(surface.end_stroke(), None);
        assert!(surface.history().is_empty());
        assert!(!surface.is_foreground_modified());
        assert_eq!(listener.changed.load(Ordering::Relaxed), 0);

        // A second down discards the first, unfinished stroke.
        surface.begin_stroke(1.0, 1.0);
        surface.extend_stroke(50.0, 1.0);
        surface.begin_stroke(90.0, 70.0);
        surface.end_stroke();
        assert_eq!(surface.history().len(), 1);
        assert_eq!(surface.foreground().pixel(25, 1), Some(Color::TRANSPARENT));
        assert_eq!(listener.changed.load(Ordering::Relaxed), 2);
    }
    #[test]
    fn damage_rect_covers_segment_with_margin() {
        let mut surface = blank();
        surface.begin_stroke(30.0, 40.0);
        let damage = surface.extend_stroke(10.0, 60.0).unwrap();
        assert_eq!(
            damage,
            DamageRect {
                left: -40,
                top: -10,
                right: 80,
                bottom: 110
            }
        );
        assert!(damage.contains(30, 40));
        assert!(damage.contains(-40, 109));
        assert!(!damage.contains(80, 60));
        // Next segment starts from the last sample.
        let damage = surface.extend_stroke(12.0, 61.0).unwrap();
        assert_eq!(damage.left, -40);
        assert_eq!(damage.right, 62);
        assert_eq!(surface.end_stroke(), Some(DamageRect::full(viewport())));
    }
    #[test]
    fn undo_on_loaded_page_requests_reload() {
        let listener = Arc::new(Counting::default());
        let mut surface = DrawSurface::new(2, viewport(), listener.clone()).unwrap();
        let persisted = RasterSurface::filled(100, 80, Color::new(0, 0, 255, 255)).unwrap();
        surface.load_foreground(persisted);
        assert!(!surface.is_fresh());
        assert!(!surface.is_foreground_modified());

        surface.set_paint_color(Color::new(255, 0, 0, 255));
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        assert_eq!(surface.undo(), Undone::NeedsReload { remaining: 0 });
        assert_eq!(listener.reloads.load(Ordering::Relaxed), 1);
        // Until the host reloads, only replayed strokes remain.
        assert!(surface.foreground().is_blank());

        surface.load_foreground(RasterSurface::filled(100, 80, Color::new(0, 0, 255, 255)).unwrap());
        assert_eq!(
            surface.foreground().pixel(15, 10),
            Some(Color::new(0, 0, 255, 255))
        );
    }
    #[test]
    fn reload_keeps_remaining_history_on_top() {
        let mut surface = blank();
        surface.load_foreground(RasterSurface::filled(100, 80, Color::WHITE).unwrap());
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        stroke(&mut surface, [10.0, 50.0], [20.0, 50.0]);
        surface.undo();
        surface.load_foreground(RasterSurface::filled(100, 80, Color::WHITE).unwrap());
        assert_eq!(surface.foreground().pixel(15, 10), Some(Color::BLACK));
        assert_eq!(surface.foreground().pixel(15, 50), Some(Color::WHITE));
    }
    #[test]
    fn clear_from_undo_only_touches_foreground() {
        let listener = Arc::new(Counting::default());
        let mut surface = DrawSurface::new(0, viewport(), listener.clone()).unwrap();
        surface.set_background(RasterSurface::filled(100, 80, Color::WHITE).unwrap(), true);
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        assert!(!surface.clear(true));
        assert!(surface.foreground().is_blank());
        assert!(surface.background().is_some());
        assert_eq!(surface.history().len(), 1);
        assert!(surface.is_foreground_modified());
        assert_eq!(listener.reloads.load(Ordering::Relaxed), 0);

        surface.load_foreground(RasterSurface::new(100, 80).unwrap());
        assert!(surface.clear(true));
        assert_eq!(listener.reloads.load(Ordering::Relaxed), 1);
    }
    #[test]
    fn clear_undo_cache_keeps_raster() {
        let mut surface = blank();
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        surface.clear_undo_cache();
        assert!(surface.history().is_empty());
        assert!(!surface.foreground().is_blank());
        assert_eq!(surface.undo(), Undone::Nothing);
    }
    #[test]
    fn compose_layers_in_order() {
        let mut surface = blank();
        assert_eq!(surface.compose().unwrap().pixel(0, 0), Some(Color::WHITE));

        let blue = Color::new(0, 0, 255, 255);
        surface.set_background(RasterSurface::filled(100, 80, blue).unwrap(), true);
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        surface.begin_stroke(50.0, 50.0);

        let frame = surface.compose().unwrap();
        assert_eq!(frame.pixel(0, 0), Some(blue));
        assert_eq!(frame.pixel(15, 10), Some(Color::BLACK));
        // In-progress stroke is shown but not committed.
        assert_eq!(frame.pixel(50, 50), Some(Color::BLACK));
        assert_eq!(surface.foreground().pixel(50, 50), Some(Color::TRANSPARENT));
    }
    #[test]
    fn mark_saved_resets_flags() {
        let mut surface = blank();
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        surface.clear(false);
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        surface.mark_saved();
        assert!(!surface.is_dirty());
        assert!(!surface.delete_status());
    }
    #[test]
    fn undo_after_save_is_a_change() {
        let listener = Arc::new(Counting::default());
        let mut surface = DrawSurface::new(0, viewport(), listener.clone()).unwrap();
        stroke(&mut surface, [10.0, 10.0], [20.0, 10.0]);
        surface.mark_saved();
        assert!(!surface.is_dirty());

        assert_eq!(surface.undo(), Undone::Replayed { remaining: 0 });
        assert!(surface.is_foreground_modified());
        assert_eq!(listener.changed.load(Ordering::Relaxed), 2);

        // Nothing left to undo is not a change.
        surface.mark_saved();
        assert_eq!(surface.undo(), Undone::Nothing);
        assert!(!surface.is_dirty());
        assert_eq!(listener.changed.load(Ordering::Relaxed), 2);
    }
    #[test]
    fn pen_accessors() {
        let mut surface = blank();
        surface.set_pen_width(0.0);
        assert_eq!(surface.pen_width(), crate::stroke::Pen::DEFAULT_WIDTH);
        surface.set_pen_width(9.0);
        surface.set_paint_color(Color::WHITE);
        assert_eq!(surface.pen_width(), 9.0);
        assert_eq!(surface.paint_color(), Color::WHITE);
    }
}
