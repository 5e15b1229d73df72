/// The pixel size shared by every raster of a note session.
///
/// Established once by the host from its display metrics and handed to
/// [`crate::pages::PageSet`] and [`crate::surface::DrawSurface`] at construction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Viewport {
    width: u32,
    height: u32,
}
impl Viewport {
    /// Returns `None` if either dimension is zero.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
    #[must_use]
    pub const fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}
