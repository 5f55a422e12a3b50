use std::sync::Arc;

use image::RgbaImage;
use image::imageops::FilterType;

use crate::foundation::error::{ConfiguratorError, ConfiguratorResult};

/// Decoded image shared between the cache, the renderer and the hit tester.
///
/// Pixels are straight (non-premultiplied) RGBA8 as produced by the decoder.
pub type ImageHandle = Arc<RgbaImage>;

/// Decode an encoded image (PNG, JPEG, ...) into an [`ImageHandle`].
pub fn decode_image(bytes: &[u8]) -> ConfiguratorResult<ImageHandle> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ConfiguratorError::validation(format!("image decode failed: {e}")))?;
    Ok(Arc::new(img.to_rgba8()))
}

/// Scale `img` to `width x height`, reusing the pixels when sizes already match.
///
/// Masks must use [`FilterType::Nearest`] so that part indices are never blended.
pub(crate) fn fit(img: &RgbaImage, width: u32, height: u32, filter: FilterType) -> RgbaImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    image::imageops::resize(img, width.max(1), height.max(1), filter)
}

/// Convert straight RGBA8 into premultiplied RGBA8 in place.
pub(crate) fn premultiply_in_place(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        for c in 0..3 {
            px[c] = ((u16::from(px[c]) * a + 127) / 255) as u8;
        }
    }
}

/// Solid-color helper used by tests, demos and placeholder surfaces.
pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> ImageHandle {
    Arc::new(RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
}
