use super::*;

fn rev(ms: f64) -> StepTiming {
    StepTiming {
        revolution_duration: Some(ms),
        ..StepTiming::default()
    }
}

#[test]
fn shortest_path_takes_wraparound() {
    assert_eq!(shortest_path(23, 1, 24), (2, true));
    assert_eq!(shortest_path(1, 23, 24), (2, false));
    assert_eq!(shortest_path(0, 12, 24), (12, true));
    assert_eq!(shortest_path(5, 5, 24), (0, true));
}

#[test]
fn untimed_or_empty_rotations_have_no_plan() {
    assert!(RotationPlan::new(0, 5, 24, StepTiming::default(), 0.0).is_none());
    assert!(RotationPlan::new(3, 3, 24, rev(2400.0), 0.0).is_none());
    assert!(RotationPlan::new(0, 0, 1, rev(2400.0), 0.0).is_none());
}

#[test]
fn revolution_duration_sets_per_step_time() {
    let plan = RotationPlan::new(0, 12, 24, rev(2400.0), 0.0).unwrap();
    assert_eq!(plan.step_count(), 12);
    assert_eq!(plan.step_duration(), 100.0);
    assert_eq!(plan.duration(), 1200.0);

    let plan = RotationPlan::new(0, 2, 24, rev(1000.0), 0.0).unwrap();
    assert_eq!(plan.step_duration(), 41.0);
}

#[test]
fn explicit_duration_is_split_across_steps() {
    let timing = StepTiming {
        duration: Some(300.0),
        ..StepTiming::default()
    };
    let plan = RotationPlan::new(22, 1, 24, timing, 0.0).unwrap();
    assert_eq!(plan.step_count(), 3);
    assert_eq!(plan.step_duration(), 100.0);

    let timing = StepTiming {
        duration: Some(5000.0),
        step_duration: Some(50.0),
        revolution_duration: None,
    };
    let plan = RotationPlan::new(0, 4, 24, timing, 0.0).unwrap();
    assert_eq!(plan.duration(), 200.0);
}

#[test]
fn on_time_ticks_visit_every_position() {
    let mut plan = RotationPlan::new(23, 1, 24, rev(2400.0), 0.0).unwrap();
    let a = plan.advance(0.0);
    assert_eq!((a.position, a.sleep_ms, a.last), (0, 100.0, false));
    let b = plan.advance(100.0);
    assert_eq!((b.position, b.sleep_ms, b.last), (1, 100.0, true));
    assert!(plan.is_finished());
}

#[test]
fn backward_rotation_wraps_below_zero() {
    let mut plan = RotationPlan::new(1, 22, 24, rev(2400.0), 0.0).unwrap();
    assert!(!plan.is_forward());
    let positions = (0..3)
        .map(|i| plan.advance(f64::from(i) * 100.0).position)
        .collect::<Vec<_>>();
    assert_eq!(positions, vec![0, 23, 22]);
}

#[test]
fn late_ticks_skip_steps_and_shorten_sleep() {
    let mut plan = RotationPlan::new(0, 12, 24, rev(2400.0), 1000.0).unwrap();
    assert_eq!(plan.advance(1000.0).position, 1);
    assert_eq!(plan.advance(1100.0).position, 2);

    // expected at 1200, running 250ms late
    let late = plan.advance(1450.0);
    assert_eq!(late.position, 5);
    assert_eq!(late.sleep_ms, 50.0);

    // far beyond the end clamps to the target
    let end = plan.advance(9000.0);
    assert_eq!(end.position, 12);
    assert!(end.last);
}
