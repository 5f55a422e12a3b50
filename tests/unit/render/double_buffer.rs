use super::*;
use crate::assets::image::solid;

fn raster() -> DoubleBufferRenderer {
    DoubleBufferRenderer::new(RendererKind::Raster, (4, 4), (2, 2))
}

#[test]
fn instant_draw_swaps_visibility() {
    let mut r = raster();
    assert_eq!(r.visible(), 0);
    let target = r.draw(&solid(2, 2, [255, 0, 0, 255]), Transition::Instant, 500.0, 0.0, Ease::Linear);
    assert_eq!(target, 1);
    assert_eq!(r.visible(), 1);
    let [a, b] = r.layers();
    assert!(!a.visible && b.visible);
    assert_eq!((a.opacity, b.opacity), (0.0, 1.0));
    assert!(b.z > a.z);
    assert!(!r.is_animating());
    assert_eq!(r.composite().get_pixel(1, 1).0, [255, 0, 0, 255]);
}

#[test]
fn cross_fade_runs_both_tweens() {
    let mut r = raster();
    r.draw(&solid(1, 1, [255, 0, 0, 255]), Transition::Instant, 0.0, 0.0, Ease::Linear);
    r.draw(&solid(1, 1, [0, 0, 255, 255]), Transition::Cross, 100.0, 0.0, Ease::Linear);
    assert_eq!(r.visible(), 0);
    assert!(r.advance(50.0));
    let [new, old] = r.layers();
    assert!((new.opacity - 0.5).abs() < 1e-6);
    assert!((old.opacity - 0.5).abs() < 1e-6);
    assert!(!r.advance(100.0));
    let [new, old] = r.layers();
    assert_eq!((new.opacity, old.opacity), (1.0, 0.0));
    assert_eq!(r.composite().get_pixel(0, 0).0, [0, 0, 255, 255]);
}

#[test]
fn simple_fade_hides_old_surface_when_done() {
    let mut r = raster();
    r.draw(&solid(1, 1, [255, 0, 0, 255]), Transition::Instant, 0.0, 0.0, Ease::Linear);
    r.draw(&solid(1, 1, [0, 255, 0, 255]), Transition::Simple, 100.0, 0.0, Ease::Linear);
    r.advance(50.0);
    let [_, old] = r.layers();
    assert_eq!(old.opacity, 1.0);
    r.advance(150.0);
    let [_, old] = r.layers();
    assert_eq!(old.opacity, 0.0);
}

#[test]
fn redraw_cancels_running_fade() {
    let mut r = raster();
    r.draw(&solid(1, 1, [255, 0, 0, 255]), Transition::Cross, 100.0, 0.0, Ease::Linear);
    r.advance(20.0);
    r.draw(&solid(1, 1, [0, 255, 0, 255]), Transition::Instant, 0.0, 20.0, Ease::Linear);
    assert!(!r.is_animating());
    assert_eq!(r.visible(), 0);
    assert_eq!(r.draw_count(), 2);
}

#[test]
fn mask_is_scaled_without_blending() {
    let mut r = raster();
    let mut mask = RgbaImage::new(1, 1);
    mask.put_pixel(0, 0, image::Rgba([7, 0, 0, 255]));
    r.draw_mask(&std::sync::Arc::new(mask));
    let m = r.mask().unwrap();
    assert_eq!(m.dimensions(), (2, 2));
    assert!(m.pixels().all(|p| p[0] == 7));
}

#[test]
fn headless_keeps_state_but_not_pixels() {
    let mut r = DoubleBufferRenderer::new(RendererKind::Headless, (4, 4), (2, 2));
    r.draw(&solid(1, 1, [255, 0, 0, 255]), Transition::Instant, 0.0, 0.0, Ease::Linear);
    assert_eq!(r.visible(), 1);
    assert_eq!(r.composite().get_pixel(0, 0).0, [0, 0, 0, 0]);
}

#[test]
fn overlay_fades_to_target_opacity() {
    let mut r = raster();
    r.set_overlay(Some(solid(1, 1, [0, 0, 0, 255])));
    r.fade_overlay(0.0, 0.4, 0.0, 100.0, Ease::Linear);
    r.advance(100.0);
    assert!((r.overlay_opacity() - 0.4).abs() < 1e-6);
}
