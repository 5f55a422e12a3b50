use image::RgbaImage;

use crate::foundation::error::{ConfiguratorError, ConfiguratorResult};

pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over, with `opacity` scaling the whole source pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    // NaN and negative opacities end up as 0
    let layer = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let src = src.map(|c| scale(c, layer));
    if src[3] == 0 {
        return dst;
    }
    let keep = 255 - src[3];
    std::array::from_fn(|i| src[i].saturating_add(scale(dst[i], keep)))
}

/// Composite `src` over `dst` in place; both must have the same dimensions.
pub fn over_image(dst: &mut RgbaImage, src: &RgbaImage, opacity: f32) -> ConfiguratorResult<()> {
    if dst.dimensions() != src.dimensions() {
        return Err(ConfiguratorError::validation(format!(
            "layer size {:?} does not match target {:?}",
            src.dimensions(),
            dst.dimensions()
        )));
    }
    if opacity <= 0.0 {
        return Ok(());
    }
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        d.0 = over(d.0, s.0, opacity);
    }
    Ok(())
}

/// Convert premultiplied RGBA8 back to straight alpha, for encoding.
pub fn unpremultiply_in_place(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = u32::from(px[3]);
        if a == 0 {
            px.0 = [0, 0, 0, 0];
            continue;
        }
        if a == 255 {
            continue;
        }
        for c in 0..3 {
            px[c] = ((u32::from(px[c]) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// `c * f / 255`, rounded.
fn scale(c: u8, f: u8) -> u8 {
    ((u32::from(c) * u32::from(f) + 127) / 255) as u8
}
