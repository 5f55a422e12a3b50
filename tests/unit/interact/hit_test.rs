use super::*;

fn tester() -> MaskHitTester {
    let parts = ["upper", "laces", "sole", "heel", "logo", "tongue"]
        .into_iter()
        .map(String::from)
        .collect();
    MaskHitTester::new(parts, BTreeSet::from(["sole".to_string()]))
}

// 10x10 mask: left half index 0, right half index 5
fn mask() -> RgbaImage {
    RgbaImage::from_fn(10, 10, |x, _| {
        if x < 5 {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([5, 0, 0, 255])
        }
    })
}

#[test]
fn zero_index_is_background() {
    let t = tester();
    assert_eq!(t.resolve_part(Some(&mask()), Point::new(10.0, 10.0), 100.0), None);
}

#[test]
fn index_maps_into_sorted_parts() {
    let t = tester();
    assert_eq!(t.parts()[4], "tongue");
    assert_eq!(
        t.resolve_part(Some(&mask()), Point::new(80.0, 20.0), 100.0),
        Some("tongue")
    );
}

#[test]
fn coordinates_are_scaled_to_mask_resolution() {
    let m = mask();
    assert_eq!(mask_index(&m, Point::new(49.9, 0.0), 100.0), 0);
    assert_eq!(mask_index(&m, Point::new(50.0, 0.0), 100.0), 5);
}

#[test]
fn out_of_bounds_resolves_to_nothing() {
    let t = tester();
    let m = mask();
    assert_eq!(t.resolve_part(Some(&m), Point::new(100.0, 5.0), 100.0), None);
    assert_eq!(t.resolve_part(Some(&m), Point::new(-3.0, 5.0), 100.0), None);
    assert_eq!(t.resolve_part(Some(&m), Point::new(5.0, 500.0), 100.0), None);
    assert_eq!(t.resolve_part(Some(&m), Point::new(80.0, 5.0), 0.0), None);
    assert_eq!(t.resolve_part(None, Point::new(80.0, 5.0), 100.0), None);
}

#[test]
fn hidden_parts_keep_their_index_but_are_not_interactive() {
    let t = tester();
    let m = RgbaImage::from_pixel(4, 4, image::Rgba([4, 0, 0, 255]));
    assert_eq!(t.resolve_part(Some(&m), Point::new(1.0, 1.0), 4.0), Some("sole"));
    assert_eq!(t.interactive_part(Some(&m), Point::new(1.0, 1.0), 4.0), None);
}

#[test]
fn index_beyond_parts_list_is_nothing() {
    let t = tester();
    assert_eq!(t.part_for_index(200), None);
}
