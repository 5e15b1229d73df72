//! Image encoding for persisted rasters. Foregrounds need their alpha channel and exact pixels, so they
//! go through PNG. Backgrounds, thumbnails, and exports are opaque photos and use JPEG.

use std::{fs::File, io::BufWriter, path::Path};

use deepnotes_core::RasterSurface;
use image::buffer::ConvertBuffer;

use super::StoreError;

/// Write `surface` losslessly, with alpha.
pub(crate) fn write_png(surface: &RasterSurface, path: &Path) -> Result<(), StoreError> {
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(file, surface.width(), surface.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(surface.as_image().as_raw())?;
    writer.finish()?;
    Ok(())
}

/// Write `surface` as JPEG at `quality` (1..=100), discarding alpha.
pub(crate) fn write_jpeg(surface: &RasterSurface, path: &Path, quality: u8) -> Result<(), StoreError> {
    let rgb: image::RgbImage = surface.as_image().convert();
    let mut file = BufWriter::new(File::create(path)?);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, quality.clamp(1, 100));
    encoder.encode_image(&rgb)?;
    drop(encoder);
    std::io::Write::flush(&mut file)?;
    Ok(())
}

/// Decode any supported image file into an RGBA raster.
pub(crate) fn read(path: &Path) -> Result<RasterSurface, StoreError> {
    let image = image::open(path)?.into_rgba8();
    Ok(RasterSurface::from_image(image)?)
}

/// Decode `path` if it exists. Missing files are `Ok(None)`.
pub(crate) fn read_if_present(path: &Path) -> Result<Option<RasterSurface>, StoreError> {
    match path.try_exists() {
        Ok(true) => read(path).map(Some),
        Ok(false) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
