use image::RgbaImage;

use crate::animation::ease::Ease;
use crate::assets::image::ImageHandle;
use crate::config::Transition;
use crate::render::double_buffer::DoubleBufferRenderer;

/// Observable state of one frame surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerState {
    pub visible: bool,
    pub opacity: f32,
    /// Stacking order; higher is on top.
    pub z: u8,
}

/// Which renderer [`create_renderer`] builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Keep frame pixels and composite them on demand.
    #[default]
    Raster,
    /// Track buffer state and the index mask only.
    Headless,
}

/// Drawing surface the configurator renders into.
///
/// Only the update path calls [`FrameRenderer::draw`]; preloading never does.
pub trait FrameRenderer {
    fn kind(&self) -> RendererKind;

    /// Resize the frame surfaces and the mask surface. Drops drawn content.
    fn resize(&mut self, surface: (u32, u32), mask: (u32, u32));

    fn surface_size(&self) -> (u32, u32);

    /// Paint `image` into the hidden surface and make it visible.
    ///
    /// Cancels running fades on both surfaces first. Returns the index of
    /// the surface that now shows `image`.
    fn draw(
        &mut self,
        image: &ImageHandle,
        transition: Transition,
        duration_ms: f64,
        now_ms: f64,
        ease: Ease,
    ) -> usize;

    /// Replace the index mask used for hit testing.
    fn draw_mask(&mut self, mask: &ImageHandle);

    fn mask(&self) -> Option<&RgbaImage>;

    /// Set (or drop) the highlight overlay image.
    fn set_overlay(&mut self, image: Option<ImageHandle>);

    fn fade_overlay(&mut self, from: f32, to: f32, now_ms: f64, duration_ms: f64, ease: Ease);

    fn overlay_opacity(&self) -> f32;

    /// Advance running fades; returns `true` while a frame fade is running.
    fn advance(&mut self, now_ms: f64) -> bool;

    /// `true` while a frame fade is running (overlay fades excluded).
    fn is_animating(&self) -> bool;

    fn layers(&self) -> [LayerState; 2];

    /// Index of the visible surface.
    fn visible(&self) -> usize;

    /// Number of frame draws so far.
    fn draw_count(&self) -> u64;

    /// Flatten surfaces and overlay into straight-alpha RGBA.
    fn composite(&self) -> RgbaImage;

    /// Drop all drawn content and reset to the initial state.
    fn clear(&mut self);
}

pub fn create_renderer(
    kind: RendererKind,
    surface: (u32, u32),
    mask: (u32, u32),
) -> Box<dyn FrameRenderer> {
    Box::new(DoubleBufferRenderer::new(kind, surface, mask))
}
