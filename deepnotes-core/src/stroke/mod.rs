//! # Strokes
//!
//! A stroke is one continuous pointer-down to pointer-up gesture. While the pointer is held it lives in a
//! [`StrokeBuilder`], which smooths raw samples into quadratic curves. On release it becomes an immutable
//! [`StrokePath`], which can be rendered any number of times with identical results.

mod rasterize;

use lyon_tessellation::path::{
    math::{point, Point},
    Path,
};

use crate::{color::Color, raster::RasterSurface};

/// Paint attributes of a stroke. Caps and joins are always round.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Pen {
    pub color: Color,
    /// Full width of the stroke, in surface pixels.
    pub width: f32,
}
impl Pen {
    pub const DEFAULT_WIDTH: f32 = 5.0;
    /// Set the width, ignoring non-finite or non-positive values.
    pub fn set_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.width = width;
        } else {
            log::debug!("ignoring invalid pen width {width}");
        }
    }
}
impl Default for Pen {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: Self::DEFAULT_WIDTH,
        }
    }
}

/// A committed stroke: geometry plus the pen it was drawn with.
///
/// There are no mutating methods, a `StrokePath` in undo history stays exactly as it was drawn.
#[derive(Clone)]
pub struct StrokePath {
    path: Path,
    pen: Pen,
}
impl StrokePath {
    #[must_use]
    pub fn pen(&self) -> Pen {
        self.pen
    }
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
    /// Rasterize this stroke over the existing contents of `target`.
    pub fn render_onto(&self, target: &mut RasterSurface) {
        rasterize::rasterize(&self.path, self.pen, target);
    }
}
impl std::fmt::Debug for StrokePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrokePath")
            .field("pen", &self.pen)
            .field("events", &self.path.iter().count())
            .finish()
    }
}

/// A stroke under construction.
///
/// Each new sample `p` extends the path with a quadratic curve controlled by the previous sample and
/// ending halfway between the two, which rounds off the corners of raw pointer input.
#[derive(Clone, Debug)]
pub struct StrokeBuilder {
    start: Point,
    /// `(control, to)` pairs, in order.
    curves: Vec<(Point, Point)>,
    last: Point,
}
impl StrokeBuilder {
    #[must_use]
    pub fn begin(x: f32, y: f32) -> Self {
        let start = point(x, y);
        Self {
            start,
            curves: Vec::new(),
            last: start,
        }
    }
    /// The most recent raw sample.
    #[must_use]
    pub fn last(&self) -> [f32; 2] {
        [self.last.x, self.last.y]
    }
    /// Add a sample, returning the previous one.
    pub fn extend(&mut self, x: f32, y: f32) -> [f32; 2] {
        let previous = self.last;
        let next = point(x, y);
        self.curves.push((previous, previous.lerp(next, 0.5)));
        self.last = next;
        [previous.x, previous.y]
    }
    /// Number of samples taken so far, including the first.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.curves.len() + 1
    }
    /// The path as it would be committed right now, ending with a line to the last sample.
    #[must_use]
    pub fn to_path(&self) -> Path {
        let mut builder = Path::builder();
        builder.begin(self.start);
        for &(ctrl, to) in &self.curves {
            builder.quadratic_bezier_to(ctrl, to);
        }
        builder.line_to(self.last);
        builder.end(false);
        builder.build()
    }
    /// Render the in-progress stroke, for previews.
    pub fn render_onto(&self, pen: Pen, target: &mut RasterSurface) {
        rasterize::rasterize(&self.to_path(), pen, target);
    }
    /// Close off the path and freeze it.
    #[must_use]
    pub fn finish(self, pen: Pen) -> StrokePath {
        StrokePath {
            path: self.to_path(),
            pen,
        }
    }
}
