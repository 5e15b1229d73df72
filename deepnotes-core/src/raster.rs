//! # Raster surfaces
//!
//! Owned RGBA pixel buffers. Every buffer of a note session has the size of the session's
//! [`Viewport`](crate::viewport::Viewport), except thumbnails produced by [`RasterSurface::scaled`].

use crate::color::Color;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    #[error("raster dimensions must be nonzero, got {0}x{1}")]
    ZeroSized(u32, u32),
    #[error("not enough memory for a {0}x{1} raster")]
    OutOfMemory(u32, u32),
}

/// Allocate a buffer of `width * height` pixels, all set to `fill`.
/// Reports allocation failure rather than aborting, as several viewport-sized buffers per page may be live.
fn allocate(width: u32, height: u32, fill: Color) -> Result<image::RgbaImage, AllocationError> {
    if width == 0 || height == 0 {
        return Err(AllocationError::ZeroSized(width, height));
    }
    let oom = AllocationError::OutOfMemory(width, height);
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(oom)?;

    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|_| oom)?;
    // Capacity reserved above, neither of these reallocate.
    data.resize(len, 0);
    if fill != Color::TRANSPARENT {
        let rgba = fill.as_rgba();
        for pixel in data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    image::RgbaImage::from_raw(width, height, data).ok_or(oom)
}

/// An owned, straight-alpha RGBA buffer.
///
/// Dimensions are fixed for the life of the surface.
#[derive(Debug)]
pub struct RasterSurface {
    image: image::RgbaImage,
}
impl RasterSurface {
    /// A fully transparent surface.
    /// # Errors
    /// If either dimension is zero, or the buffer cannot be allocated.
    pub fn new(width: u32, height: u32) -> Result<Self, AllocationError> {
        Self::filled(width, height, Color::TRANSPARENT)
    }
    /// A surface with every pixel set to `color`.
    /// # Errors
    /// If either dimension is zero, or the buffer cannot be allocated.
    pub fn filled(width: u32, height: u32, color: Color) -> Result<Self, AllocationError> {
        Ok(Self {
            image: allocate(width, height, color)?,
        })
    }
    /// A fully transparent surface the size of `viewport`.
    /// # Errors
    /// If the buffer cannot be allocated.
    pub fn for_viewport(viewport: crate::viewport::Viewport) -> Result<Self, AllocationError> {
        Self::new(viewport.width(), viewport.height())
    }
    /// Take ownership of decoded pixels.
    /// # Errors
    /// If the image has a zero dimension.
    pub fn from_image(image: image::RgbaImage) -> Result<Self, AllocationError> {
        if image.width() == 0 || image.height() == 0 {
            Err(AllocationError::ZeroSized(image.width(), image.height()))
        } else {
            Ok(Self { image })
        }
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
    #[must_use]
    pub fn size(&self) -> [u32; 2] {
        [self.width(), self.height()]
    }
    /// Color of a single pixel, or `None` if out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image.get_pixel_checked(x, y).map(|&pixel| pixel.into())
    }
    #[must_use]
    pub fn as_image(&self) -> &image::RgbaImage {
        &self.image
    }
    #[must_use]
    pub fn into_image(self) -> image::RgbaImage {
        self.image
    }
    pub(crate) fn image_mut(&mut self) -> &mut image::RgbaImage {
        &mut self.image
    }
    /// Set every pixel to `color`, reusing the existing buffer.
    pub fn fill(&mut self, color: Color) {
        let rgba: image::Rgba<u8> = color.into();
        for pixel in self.image.pixels_mut() {
            *pixel = rgba;
        }
    }
    /// Reset to fully transparent, reusing the existing buffer.
    pub fn clear(&mut self) {
        self.fill(Color::TRANSPARENT);
    }
    /// True if no pixel has any coverage.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|pixel| pixel.0[3] == 0)
    }
    /// Draw `src` over `self` with its top-left corner at `(x, y)`, using alpha-over compositing.
    /// Parts of `src` falling outside of `self` are dropped. No scaling is performed.
    pub fn composite(&mut self, src: &RasterSurface, x: i64, y: i64) {
        image::imageops::overlay(&mut self.image, &src.image, x, y);
    }
    /// A bilinear resample of this surface to `round(width * factor) x round(height * factor)`.
    /// # Errors
    /// If the resulting size rounds to zero, or `factor` is not a positive finite number.
    pub fn scaled(&self, factor: f32) -> Result<RasterSurface, AllocationError> {
        let scale = |dim: u32| -> u32 {
            if factor.is_finite() && factor > 0.0 {
                (f64::from(dim) * f64::from(factor)).round() as u32
            } else {
                0
            }
        };
        let (width, height) = (scale(self.width()), scale(self.height()));
        if width == 0 || height == 0 {
            return Err(AllocationError::ZeroSized(width, height));
        }
        let image = image::imageops::resize(
            &self.image,
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
        Ok(Self { image })
    }
    /// Free the pixel buffer now.
    ///
    /// Equivalent to dropping, spelled out at the sites where a surface is replaced so that the old
    /// buffer is gone before the replacement grows the heap further.
    pub fn release(self) {
        log::trace!("releasing {}x{} raster", self.width(), self.height());
        drop(self);
    }
}
