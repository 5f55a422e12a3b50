use std::sync::mpsc::Receiver;

use super::*;
use crate::assets::image::solid;
use crate::assets::source::MemorySource;
use crate::assets::url::DirUrlResolver;
use crate::foundation::core::ManualClock;

const PRODUCT: &str = r#"{
    "brand": "acme",
    "model": "runner",
    "frames": {"side": 4, "top": 1},
    "defaults": {
        "sole": {"material": "rubber", "color": "white"},
        "laces": {"material": "cotton", "color": "black"}
    }
}"#;

fn opts() -> ConfiguratorOpts {
    ConfiguratorOpts {
        width: 8,
        height: 8,
        max_size: 16,
        pixel_ratio: 1.0,
        ..ConfiguratorOpts::default()
    }
}

fn source() -> MemorySource {
    let mut src = MemorySource::new();
    for frame in ["side-0", "side-1", "side-2", "side-3", "top-0"] {
        src.insert(format!("frames/{frame}.png"), solid(8, 8, [200, 10, 10, 255]));
        // red channel 1 => "laces"
        src.insert(format!("masks/{frame}.png"), solid(8, 8, [1, 0, 0, 255]));
        src.insert(format!("masks/laces/{frame}.png"), solid(8, 8, [255, 255, 255, 255]));
    }
    src
}

struct Rig {
    cfg: Configurator<MemorySource>,
    clock: ManualClock,
    events: Receiver<Event>,
}

fn rig_with(opts: ConfiguratorOpts, source: MemorySource) -> Rig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let clock = ManualClock::new(0.0);
    let mut cfg = Configurator::new(opts, source, Box::new(DirUrlResolver::default()))
        .unwrap()
        .with_clock(Box::new(clock.clone()))
        .with_renderer(RendererKind::Headless);
    let (_, events) = cfg.subscribe(None);
    Rig { cfg, clock, events }
}

fn rig() -> Rig {
    rig_with(opts(), source())
}

impl Rig {
    fn load(&mut self) {
        let product = ProductSpec::from_json_str(PRODUCT).unwrap();
        self.cfg.load_product(product, None).unwrap();
    }

    fn settle(&mut self) {
        for _ in 0..500 {
            self.clock.advance(10.0);
            self.cfg.tick();
            if self.cfg.is_idle() {
                return;
            }
        }
        panic!("configurator did not settle: {:?}", self.cfg);
    }

    fn drain(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }

    fn drawn(&self) -> Vec<&str> {
        self.cfg.draw_log().iter().map(|d| d.frame.as_str()).collect()
    }
}

#[test]
fn update_before_product_is_not_loaded() {
    let mut r = rig();
    assert_eq!(r.cfg.update(UpdateOpts::default()), UpdateStatus::NotLoaded);
    assert_eq!(r.drain(), vec![Event::NotLoaded]);
    assert!(!r.cfg.state().ready);
}

#[test]
fn load_product_draws_preloads_and_reports() {
    let mut r = rig();
    r.load();
    assert!(r.cfg.state().ready);
    assert!(r.cfg.state().preloading);
    r.settle();

    let events = r.drain();
    assert_eq!(events[0], Event::Ready);
    assert_eq!(events[1], Event::ChangedFrame("side-0".to_string()));
    assert!(events.contains(&Event::Loaded));
    assert_eq!(
        events.last(),
        Some(&Event::UpdateFinished {
            id: UpdateId(1),
            outcome: UpdateOutcome::Loaded(PreloadResult::Completed),
        })
    );

    assert_eq!(r.drawn(), vec!["side-0"]);
    assert_eq!(r.cfg.draw_log()[0].transition, Transition::Cross);
    for frame in ["side-1", "side-2", "side-3", "top-0"] {
        let key = r.cfg.state().frames.decode(frame).unwrap();
        assert_eq!(r.cfg.frame_status(&key), SlotStatus::Loaded, "{frame}");
        assert_eq!(r.cfg.mask_status(&key), SlotStatus::Loaded, "{frame}");
    }
    let state = r.cfg.state();
    assert!(state.preloaded && !state.preloading && !state.no_drag);
}

#[test]
fn unchanged_update_is_redundant() {
    let mut r = rig();
    r.load();
    r.settle();
    r.drain();

    assert_eq!(r.cfg.update(UpdateOpts::default()), UpdateStatus::NotLoaded);
    assert_eq!(r.drain(), vec![Event::NotLoaded]);
    assert_eq!(r.cfg.draw_log().len(), 1);

    let forced = r.cfg.update(UpdateOpts {
        force: true,
        ..UpdateOpts::default()
    });
    assert!(matches!(forced, UpdateStatus::Started(_)));
    r.settle();
    assert_eq!(r.cfg.draw_log().len(), 2);
    assert_eq!(r.cfg.draw_log()[1].transition, Transition::Instant);
}

#[test]
fn cached_frame_change_draws_synchronously() {
    let mut r = rig();
    r.load();
    r.settle();
    r.drain();

    let status = r.cfg.change_frame("side-2", ChangeFrameOpts::default()).unwrap();
    assert_eq!(status, ChangeFrameStatus::Started);
    assert_eq!(r.drawn(), vec!["side-0", "side-2"]);
    assert!(!r.cfg.state().animating);
    assert_eq!(r.cfg.state().last_frame.get("side"), Some(&0));

    let events = r.drain();
    assert_eq!(events[0], Event::ChangedFrame("side-2".to_string()));
    assert!(matches!(
        events[1],
        Event::UpdateFinished {
            outcome: UpdateOutcome::Drawn,
            ..
        }
    ));

    assert_eq!(
        r.cfg.change_frame("side-2", ChangeFrameOpts::default()).unwrap(),
        ChangeFrameStatus::AlreadyThere
    );
}

#[test]
fn invalid_frames_are_rejected_without_side_effects() {
    let mut r = rig();
    r.load();
    r.settle();
    r.drain();

    assert!(r.cfg.change_frame("side-9", ChangeFrameOpts::default()).is_err());
    assert!(r.cfg.change_frame("front", ChangeFrameOpts::default()).is_err());
    assert_eq!(r.cfg.current_frame(), "side-0");
    assert!(r.drain().is_empty());
}

#[test]
fn timed_rotation_steps_through_intermediate_frames() {
    let mut r = rig();
    r.load();
    r.settle();

    let opts = ChangeFrameOpts {
        duration: Some(400.0),
        ..ChangeFrameOpts::default()
    };
    assert_eq!(r.cfg.change_frame("side-2", opts).unwrap(), ChangeFrameStatus::Started);
    assert!(r.cfg.state().animating);
    assert!(r.cfg.state().no_drag);
    // the first step sleeps before drawing
    assert_eq!(r.cfg.draw_log().len(), 1);

    r.settle();
    let log = r.cfg.draw_log();
    assert_eq!(r.drawn(), vec!["side-0", "side-1", "side-2"]);
    assert_eq!(log[2].at_ms - log[1].at_ms, 200.0);
    assert!(!r.cfg.state().animating);
    assert!(!r.cfg.state().no_drag);
}

#[test]
fn view_change_uses_view_transition() {
    let mut r = rig();
    r.load();
    r.settle();

    r.cfg.change_frame("top", ChangeFrameOpts::default()).unwrap();
    assert!(r.cfg.state().no_drag);
    r.settle();
    let last = r.cfg.draw_log().last().unwrap();
    assert_eq!(last.frame, "top-0");
    assert_eq!(last.transition, Transition::Cross);
    assert_eq!(r.cfg.state().last_frame.get("side"), Some(&0));

    // an explicit position wins over the remembered one
    r.cfg.change_frame("side-3", ChangeFrameOpts::default()).unwrap();
    r.settle();
    assert_eq!(r.cfg.current_frame(), "side-3");
    assert!(!r.cfg.state().animating);
}

#[test]
fn frame_change_is_deferred_while_preloading() {
    let mut r = rig();
    r.load();
    let status = r.cfg.change_frame("side-1", ChangeFrameOpts::default()).unwrap();
    assert_eq!(status, ChangeFrameStatus::Deferred);
    // only the latest deferred request survives
    let status = r.cfg.change_frame("side-3", ChangeFrameOpts::default()).unwrap();
    assert_eq!(status, ChangeFrameStatus::Deferred);

    r.settle();
    assert_eq!(r.cfg.current_frame(), "side-3");
    assert_eq!(r.drawn(), vec!["side-0", "side-3"]);
}

#[test]
fn queued_updates_keep_only_the_latest() {
    let mut src = source();
    src.set_holding(true);
    let mut r = rig_with(opts(), src);
    r.load();
    r.drain();

    let mut config = r.cfg.visual_config().clone();
    config.parts.get_mut("sole").unwrap().color = "red".to_string();
    r.cfg.set_visual_config(config.clone());
    let second = r.cfg.update(UpdateOpts::default());
    config.parts.get_mut("sole").unwrap().color = "blue".to_string();
    r.cfg.set_visual_config(config);
    let third = r.cfg.update(UpdateOpts::default());
    assert!(matches!(second, UpdateStatus::Queued(_)));
    assert!(matches!(third, UpdateStatus::Queued(_)));

    let events = r.drain();
    assert!(events.contains(&Event::UpdateFinished {
        id: second.id().unwrap(),
        outcome: UpdateOutcome::Superseded,
    }));
}

#[test]
fn failed_frame_rolls_back_and_fails_the_change() {
    let mut src = source();
    src.fail("frames/side-1.png");
    let mut r = rig_with(opts(), src);
    r.load();
    r.settle();
    let events = r.drain();
    assert!(events.contains(&Event::UpdateFinished {
        id: UpdateId(1),
        outcome: UpdateOutcome::Loaded(PreloadResult::Partial { failed: 1 }),
    }));

    r.cfg.change_frame("side-1", ChangeFrameOpts::default()).unwrap();
    r.settle();
    let events = r.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ChangeFrameFailed { frame, .. } if frame == "side-1"
    )));
    assert!(r.cfg.tracker.committed().is_none());
    assert!(!r.cfg.state().animating);
    assert_eq!(r.drawn(), vec!["side-0"]);
    assert_eq!(r.cfg.current_frame(), "side-0");
    assert_eq!(
        events.iter().rev().find_map(|e| match e {
            Event::ChangedFrame(f) => Some(f.as_str()),
            _ => None,
        }),
        Some("side-0")
    );
}

#[test]
fn failed_frame_can_be_retried_once_it_loads() {
    let mut src = source();
    src.fail("frames/side-1.png");
    let mut r = rig_with(opts(), src);
    r.load();
    r.settle();
    r.cfg.change_frame("side-1", ChangeFrameOpts::default()).unwrap();
    r.settle();
    r.drain();

    r.cfg.source_mut().heal("frames/side-1.png");
    assert_eq!(
        r.cfg.change_frame("side-1", ChangeFrameOpts::default()).unwrap(),
        ChangeFrameStatus::Started
    );
    r.settle();
    assert_eq!(r.cfg.current_frame(), "side-1");
    assert_eq!(r.drawn(), vec!["side-0", "side-1"]);
    assert!(r.cfg.tracker.committed().is_some());
    assert!(!r.drain().iter().any(|e| matches!(e, Event::ChangeFrameFailed { .. })));
}

#[test]
fn hover_highlights_and_click_selects() {
    let mut r = rig_with(
        ConfiguratorOpts {
            use_masks: true,
            ..opts()
        },
        source(),
    );
    r.load();
    r.settle();
    r.drain();

    assert_eq!(r.cfg.resolve_part(1.0, 1.0).as_deref(), Some("laces"));
    r.cfg.handle_pointer(PointerEvent::new(PointerKind::Move, 1.0, 1.0));
    assert_eq!(r.cfg.state().highlighted.as_deref(), Some("laces"));
    r.settle();
    assert_eq!(r.drain(), vec![Event::HighlightedPart("laces".to_string())]);
    r.clock.advance(200.0);
    r.cfg.tick();
    assert!((r.cfg.renderer().overlay_opacity() - 0.4).abs() < 1e-6);

    r.cfg.handle_pointer(PointerEvent::new(PointerKind::Click, 1.0, 1.0));
    assert_eq!(r.drain(), vec![Event::PartSelected("laces".to_string())]);

    r.cfg.lowlight();
    assert_eq!(r.drain(), vec![Event::Lowlighted]);
    assert_eq!(r.cfg.state().highlighted, None);
}

#[test]
fn highlight_is_noop_without_masks() {
    let mut r = rig();
    r.load();
    r.settle();
    r.drain();

    r.cfg.highlight("laces");
    r.cfg.lowlight();
    assert!(r.drain().is_empty());
    assert_eq!(r.cfg.state().highlighted, None);
}

#[test]
fn drag_rotates_and_switches_views() {
    let mut r = rig();
    r.load();
    r.settle();

    r.cfg.handle_pointer(PointerEvent::new(PointerKind::Down, 4.0, 4.0));
    // 40 * (-0.5) * 4 / 24 => offset -3.33 => position 3
    r.cfg.handle_pointer(PointerEvent::new(PointerKind::Move, 8.0, 4.0));
    assert_eq!(r.cfg.current_frame(), "side-3");

    // upward drag crosses the vertical threshold
    r.cfg.handle_pointer(PointerEvent::new(PointerKind::Move, 8.0, 8.0));
    r.settle();
    r.cfg.handle_pointer(PointerEvent::new(PointerKind::Up, 8.0, 8.0));
    assert_eq!(r.cfg.current_frame(), "top-0");
    assert_eq!(r.cfg.state().last_frame.get("side"), Some(&3));
}

#[test]
fn resize_is_idempotent_and_forces_a_redraw() {
    let mut r = rig();
    r.load();
    r.settle();

    assert_eq!(r.cfg.resize(None, Some(8), Some(8)), None);
    let status = r.cfg.resize(Some(12), None, None);
    assert!(matches!(status, Some(UpdateStatus::Started(_))));
    assert_eq!(r.cfg.options().dimensions(), (12, 12));
    assert_eq!(r.cfg.renderer().surface_size(), (12, 12));

    assert!(r.cfg.enter_fullscreen().is_some());
    assert_eq!(r.cfg.options().dimensions(), (16, 16));
    assert!(r.cfg.leave_fullscreen().is_some());
    assert_eq!(r.cfg.options().dimensions(), (12, 12));
    assert!(!r.cfg.state().fullscreen);
}

#[test]
fn reloading_a_product_tears_down_and_keeps_the_frame() {
    let mut src = source();
    src.set_holding(true);
    let mut r = rig_with(opts(), src);
    r.load();
    r.cfg.source_mut().complete_all();
    r.cfg.tick();
    r.cfg.source_mut().set_holding(false);

    r.load();
    let events = r.drain();
    assert!(events.contains(&Event::UpdateFinished {
        id: UpdateId(1),
        outcome: UpdateOutcome::Canceled,
    }));
    assert!(!events.contains(&Event::Loaded));
    r.settle();
    assert_eq!(r.cfg.current_frame(), "side-0");
    assert!(r.drain().contains(&Event::Loaded));
}

#[test]
fn deinit_drops_everything() {
    let mut r = rig();
    r.load();
    r.cfg.deinit();
    assert!(!r.cfg.state().ready);
    assert!(r.cfg.is_idle());
    assert_eq!(r.cfg.update(UpdateOpts::default()), UpdateStatus::NotLoaded);
}
