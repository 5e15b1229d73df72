//! CPU stroke rasterizer.
//!
//! Paths are flattened into line segments, each segment is swept by a disk of the pen radius (giving round
//! caps and joins for free), and the maximum coverage over all segments is accumulated into a mask before
//! blending. Blending once per pixel keeps translucent pens from darkening where segments overlap.

use image::Pixel;
use lyon_tessellation::path::{iterator::PathIterator, math::Point, Path, PathEvent};

use super::Pen;
use crate::raster::RasterSurface;

/// Max distance between a curve and its flattened approximation, in pixels.
const FLATTEN_TOLERANCE: f32 = 0.1;

/// Clipped, half-open pixel bounds `[x0, x1) x [y0, y1)`.
#[derive(Copy, Clone, Debug)]
struct PixelBounds {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}
impl PixelBounds {
    /// Pixels touched by a segment swept by `radius`, clipped to `size`. `None` if nothing remains.
    fn around(a: Point, b: Point, radius: f32, size: [u32; 2]) -> Option<Self> {
        // One extra pixel for the antialiasing ramp.
        let pad = radius + 1.0;
        let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min(max as f32) as u32 };

        let x0 = clamp((a.x.min(b.x) - pad).floor(), size[0]);
        let y0 = clamp((a.y.min(b.y) - pad).floor(), size[1]);
        let x1 = clamp((a.x.max(b.x) + pad).ceil(), size[0]);
        let y1 = clamp((a.y.max(b.y) + pad).ceil(), size[1]);

        (x0 < x1 && y0 < y1).then_some(Self { x0, y0, x1, y1 })
    }
    fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
    fn width(&self) -> usize {
        (self.x1 - self.x0) as usize
    }
    fn height(&self) -> usize {
        (self.y1 - self.y0) as usize
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let len_sq = ab.square_length();
    if len_sq <= f32::EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

/// Flatten `path` into line segments. Subpaths with no extent become a single zero-length segment, so a
/// tap still leaves a dot.
fn segments(path: &Path) -> Vec<(Point, Point)> {
    let mut segments = Vec::new();
    let mut subpath_start = segments.len();
    for event in path.iter().flattened(FLATTEN_TOLERANCE) {
        match event {
            PathEvent::Begin { .. } => subpath_start = segments.len(),
            PathEvent::Line { from, to } => segments.push((from, to)),
            PathEvent::End { last, first, close } => {
                if close {
                    segments.push((last, first));
                }
                if segments.len() == subpath_start {
                    segments.push((first, first));
                }
            }
            // Flattening leaves only lines.
            PathEvent::Quadratic { from, to, .. } | PathEvent::Cubic { from, to, .. } => {
                segments.push((from, to));
            }
        }
    }
    segments
}

pub(super) fn rasterize(path: &Path, pen: Pen, target: &mut RasterSurface) {
    let radius = pen.width / 2.0;
    let size = target.size();
    let segments: Vec<_> = segments(path)
        .into_iter()
        .filter_map(|(a, b)| Some((a, b, PixelBounds::around(a, b, radius, size)?)))
        .collect();
    let Some(bounds) = segments
        .iter()
        .map(|&(_, _, bounds)| bounds)
        .reduce(PixelBounds::union)
    else {
        // Entirely off-surface.
        return;
    };

    let stride = bounds.width();
    let mut coverage = vec![0.0f32; stride * bounds.height()];
    for &(a, b, seg_bounds) in &segments {
        for y in seg_bounds.y0..seg_bounds.y1 {
            let row = (y - bounds.y0) as usize * stride;
            for x in seg_bounds.x0..seg_bounds.x1 {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                let d = distance_to_segment(center, a, b);
                let c = (radius + 0.5 - d).clamp(0.0, 1.0);
                let slot = &mut coverage[row + (x - bounds.x0) as usize];
                if c > *slot {
                    *slot = c;
                }
            }
        }
    }

    let image = target.image_mut();
    for y in bounds.y0..bounds.y1 {
        let row = (y - bounds.y0) as usize * stride;
        for x in bounds.x0..bounds.x1 {
            let c = coverage[row + (x - bounds.x0) as usize];
            if c > 0.0 {
                image.get_pixel_mut(x, y).blend(&pen.color.with_coverage(c));
            }
        }
    }
}
