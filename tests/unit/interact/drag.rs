use super::*;

const TUNING: DragTuning = DragTuning {
    sensitivity: 40.0,
    vertical_threshold: 15.0,
};

fn element() -> Size {
    Size::new(1000.0, 1000.0)
}

fn shoe() -> ViewMap {
    ViewMap::new([("side", 24), ("top", 1), ("bottom", 1)])
}

#[test]
fn drag_right_rotates_backwards_with_wraparound() {
    let mut d = DragController::new();
    d.press(Point::new(500.0, 500.0), "side", 0);
    // 25px right: offset round(40 * -0.025 * 24 / 24) = -1
    let key = d
        .drag_to(Point::new(525.0, 500.0), element(), "side", &shoe(), &BTreeMap::new(), TUNING)
        .unwrap();
    assert_eq!(key, FrameKey::new("side", 1));

    // dragging left from 0 never yields a negative position
    let mut d = DragController::new();
    d.press(Point::new(500.0, 500.0), "side", 0);
    let key = d
        .drag_to(Point::new(475.0, 500.0), element(), "side", &shoe(), &BTreeMap::new(), TUNING)
        .unwrap();
    assert_eq!(key, FrameKey::new("side", 23));
}

#[test]
fn large_drag_wraps_multiple_turns() {
    let mut d = DragController::new();
    d.press(Point::new(0.0, 0.0), "side", 3);
    // 1.5 widths: offset 60 -> (3 - 60) mod 24 = 15
    let key = d
        .drag_to(Point::new(-1500.0, 0.0), element(), "side", &shoe(), &BTreeMap::new(), TUNING)
        .unwrap();
    assert_eq!(key.position, 15);
}

#[test]
fn vertical_drag_switches_view_and_resumes_last_position() {
    let mut d = DragController::new();
    d.press(Point::new(500.0, 500.0), "side", 7);
    // moving up: percent_y = 0.5, 40 * 0.5 = 20 > 15 -> bottom
    let key = d
        .drag_to(Point::new(500.0, 0.0), element(), "side", &shoe(), &BTreeMap::new(), TUNING)
        .unwrap();
    assert_eq!(key, FrameKey::new("bottom", 0));
    assert_eq!(d.session().unwrap().reference.y, 0.0);

    // moving back down from bottom returns to side at its last position
    let last = BTreeMap::from([("side".to_string(), 7)]);
    let key = d
        .drag_to(Point::new(500.0, 500.0), element(), "bottom", &shoe(), &last, TUNING)
        .unwrap();
    assert_eq!(key, FrameKey::new("side", 7));
}

#[test]
fn missing_view_keeps_vertical_reference() {
    let frames = ViewMap::new([("side", 24)]);
    let mut d = DragController::new();
    d.press(Point::new(500.0, 500.0), "side", 2);
    let key = d
        .drag_to(Point::new(500.0, 0.0), element(), "side", &frames, &BTreeMap::new(), TUNING)
        .unwrap();
    assert_eq!(key, FrameKey::new("side", 2));
    assert_eq!(d.session().unwrap().reference.y, 500.0);
}

#[test]
fn release_records_travel_for_click_suppression() {
    let mut d = DragController::new();
    d.press(Point::new(100.0, 100.0), "side", 0);
    d.drag_to(Point::new(50.0, 100.0), element(), "side", &shoe(), &BTreeMap::new(), TUNING);
    d.release();
    assert!(!d.is_down());
    assert!(d.suppresses_click(0.015));

    d.press(Point::new(100.0, 100.0), "side", 0);
    d.release();
    assert!(!d.suppresses_click(0.015));
}

#[test]
fn no_session_means_no_frame() {
    let mut d = DragController::new();
    assert!(
        d.drag_to(Point::new(1.0, 1.0), element(), "side", &shoe(), &BTreeMap::new(), TUNING)
            .is_none()
    );
}
