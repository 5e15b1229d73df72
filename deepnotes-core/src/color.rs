/// A straight-alpha 8-bit color, stored as `[r, g, b, a]`.
///
/// Hosts typically speak packed `0xAARRGGBB` integers, see [`Color::from_argb`].
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct Color([u8; 4]);
impl Color {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }
    /// Unpack a `0xAARRGGBB` integer.
    #[must_use]
    pub const fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self([r, g, b, a])
    }
    /// Pack into a `0xAARRGGBB` integer.
    #[must_use]
    pub const fn as_argb(self) -> u32 {
        let [r, g, b, a] = self.0;
        u32::from_be_bytes([a, r, g, b])
    }
    #[must_use]
    pub const fn as_rgba(self) -> [u8; 4] {
        self.0
    }
    #[must_use]
    pub const fn alpha(self) -> u8 {
        self.0[3]
    }
    /// The same color with its alpha scaled by `coverage`, in `[0, 1]`.
    #[must_use]
    pub fn with_coverage(self, coverage: f32) -> image::Rgba<u8> {
        let [r, g, b, a] = self.0;
        let a = (f32::from(a) * coverage.clamp(0.0, 1.0)).round() as u8;
        image::Rgba([r, g, b, a])
    }
}
impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}
impl From<Color> for image::Rgba<u8> {
    fn from(value: Color) -> Self {
        image::Rgba(value.0)
    }
}
impl From<image::Rgba<u8>> for Color {
    fn from(value: image::Rgba<u8>) -> Self {
        Self(value.0)
    }
}
