use image::RgbaImage;
use image::imageops::FilterType;

use crate::animation::ease::Ease;
use crate::animation::tween::Animated;
use crate::assets::image::{ImageHandle, fit, premultiply_in_place};
use crate::config::Transition;
use crate::render::backend::{FrameRenderer, LayerState, RendererKind};
use crate::render::composite::{over_image, unpremultiply_in_place};

#[derive(Clone, Debug)]
struct Surface {
    pixels: Option<RgbaImage>,
    opacity: Animated,
    z: u8,
    visible: bool,
}

impl Surface {
    fn new(visible: bool) -> Self {
        Self {
            pixels: None,
            opacity: Animated::new(if visible { 1.0 } else { 0.0 }),
            z: u8::from(visible),
            visible,
        }
    }
}

#[derive(Clone, Debug)]
struct Overlay {
    image: Option<ImageHandle>,
    opacity: Animated,
}

/// Two alternating frame surfaces plus the index mask and highlight overlay.
///
/// Exactly one surface is visible. `draw` paints into the hidden one and
/// then swaps, instantly or with a fade. In [`RendererKind::Headless`] mode
/// frame pixels are not retained; opacity, z-order and the mask still are.
#[derive(Clone, Debug)]
pub struct DoubleBufferRenderer {
    kind: RendererKind,
    surfaces: [Surface; 2],
    width: u32,
    height: u32,
    mask: Option<RgbaImage>,
    mask_size: (u32, u32),
    overlay: Overlay,
    // surface to hide once a simple fade finishes
    hide_after_fade: Option<usize>,
    draws: u64,
}

impl DoubleBufferRenderer {
    pub fn new(kind: RendererKind, surface: (u32, u32), mask: (u32, u32)) -> Self {
        Self {
            kind,
            surfaces: [Surface::new(true), Surface::new(false)],
            width: surface.0.max(1),
            height: surface.1.max(1),
            mask: None,
            mask_size: (mask.0.max(1), mask.1.max(1)),
            overlay: Overlay {
                image: None,
                opacity: Animated::new(0.0),
            },
            hide_after_fade: None,
            draws: 0,
        }
    }

    fn front(&self) -> usize {
        if self.surfaces[0].visible { 0 } else { 1 }
    }
}

impl FrameRenderer for DoubleBufferRenderer {
    fn kind(&self) -> RendererKind {
        self.kind
    }

    fn resize(&mut self, surface: (u32, u32), mask: (u32, u32)) {
        self.width = surface.0.max(1);
        self.height = surface.1.max(1);
        self.mask_size = (mask.0.max(1), mask.1.max(1));
        for s in &mut self.surfaces {
            s.pixels = None;
        }
        self.mask = None;
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw(
        &mut self,
        image: &ImageHandle,
        transition: Transition,
        duration_ms: f64,
        now_ms: f64,
        ease: Ease,
    ) -> usize {
        let current = self.front();
        let target = 1 - current;

        // last writer wins on both surfaces
        self.surfaces[current].opacity.cancel();
        self.surfaces[target].opacity.cancel();
        if let Some(hidden) = self.hide_after_fade.take() {
            self.surfaces[hidden].opacity.set(0.0);
        }

        if self.kind == RendererKind::Raster {
            let mut pixels = fit(image, self.width, self.height, FilterType::Triangle);
            premultiply_in_place(&mut pixels);
            self.surfaces[target].pixels = Some(pixels);
        }
        self.draws += 1;

        self.surfaces[target].visible = true;
        self.surfaces[current].visible = false;
        self.surfaces[target].z = 1;
        self.surfaces[current].z = 0;

        let transition = if duration_ms > 0.0 {
            transition
        } else {
            Transition::Instant
        };
        match transition {
            Transition::Instant => {
                self.surfaces[current].opacity.set(0.0);
                self.surfaces[target].opacity.set(1.0);
            }
            Transition::Simple => {
                self.surfaces[target]
                    .opacity
                    .animate(0.0, 1.0, now_ms, duration_ms, ease);
                self.hide_after_fade = Some(current);
            }
            Transition::Cross => {
                let from = self.surfaces[current].opacity.value();
                self.surfaces[current]
                    .opacity
                    .animate(from, 0.0, now_ms, duration_ms, ease);
                self.surfaces[target]
                    .opacity
                    .animate(0.0, 1.0, now_ms, duration_ms, ease);
            }
        }
        tracing::trace!(target_surface = target, ?transition, duration_ms, "frame drawn");
        target
    }

    fn draw_mask(&mut self, mask: &ImageHandle) {
        let (w, h) = self.mask_size;
        self.mask = Some(fit(mask, w, h, FilterType::Nearest));
    }

    fn mask(&self) -> Option<&RgbaImage> {
        self.mask.as_ref()
    }

    fn set_overlay(&mut self, image: Option<ImageHandle>) {
        self.overlay.image = image;
    }

    fn fade_overlay(&mut self, from: f32, to: f32, now_ms: f64, duration_ms: f64, ease: Ease) {
        self.overlay
            .opacity
            .animate(from, to, now_ms, duration_ms, ease);
    }

    fn overlay_opacity(&self) -> f32 {
        self.overlay.opacity.value()
    }

    fn advance(&mut self, now_ms: f64) -> bool {
        for s in &mut self.surfaces {
            s.opacity.advance(now_ms);
        }
        self.overlay.opacity.advance(now_ms);
        if let Some(hidden) = self.hide_after_fade
            && !self.surfaces[1 - hidden].opacity.is_animating()
        {
            self.surfaces[hidden].opacity.set(0.0);
            self.hide_after_fade = None;
        }
        self.is_animating()
    }

    fn is_animating(&self) -> bool {
        self.surfaces.iter().any(|s| s.opacity.is_animating())
    }

    fn layers(&self) -> [LayerState; 2] {
        let state = |s: &Surface| LayerState {
            visible: s.visible,
            opacity: s.opacity.value(),
            z: s.z,
        };
        [state(&self.surfaces[0]), state(&self.surfaces[1])]
    }

    fn visible(&self) -> usize {
        self.front()
    }

    fn draw_count(&self) -> u64 {
        self.draws
    }

    fn composite(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        let mut order = [0usize, 1];
        order.sort_by_key(|&i| self.surfaces[i].z);
        for i in order {
            let s = &self.surfaces[i];
            if let Some(pixels) = &s.pixels
                && let Err(err) = over_image(&mut out, pixels, s.opacity.value())
            {
                tracing::warn!(%err, "skipping stale surface");
            }
        }
        if let Some(overlay) = &self.overlay.image {
            let mut scaled = fit(overlay, self.width, self.height, FilterType::Triangle);
            premultiply_in_place(&mut scaled);
            if let Err(err) = over_image(&mut out, &scaled, self.overlay.opacity.value()) {
                tracing::warn!(%err, "skipping highlight overlay");
            }
        }
        unpremultiply_in_place(&mut out);
        out
    }

    fn clear(&mut self) {
        let kind = self.kind;
        *self = Self::new(kind, (self.width, self.height), self.mask_size);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/double_buffer.rs"]
mod tests;
