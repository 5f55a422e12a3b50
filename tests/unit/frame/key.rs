use super::*;

fn shoe() -> ViewMap {
    ViewMap::new([("side", 24), ("top", 1), ("bottom", 1), ("sole", 0)])
}

#[test]
fn parse_accepts_both_forms() {
    assert_eq!(FrameKey::parse("side-3").unwrap(), FrameKey::new("side", 3));
    assert_eq!(FrameKey::parse("top").unwrap(), FrameKey::new("top", 0));
    assert_eq!(FrameKey::parse(" top-0 ").unwrap(), FrameKey::new("top", 0));
    assert!(FrameKey::parse("").is_err());
    assert!(FrameKey::parse("-3").is_err());
}

#[test]
fn display_is_canonical() {
    assert_eq!(FrameKey::new("side", 12).to_string(), "side-12");
}

#[test]
fn decode_validates_ranges() {
    let views = shoe();
    assert_eq!(views.decode("side-23").unwrap(), FrameKey::new("side", 23));
    assert!(matches!(
        views.decode("side-24"),
        Err(ConfiguratorError::FrameOutOfRange { frames: 24, .. })
    ));
    assert!(matches!(
        views.decode("front-0"),
        Err(ConfiguratorError::InvalidFrame(_))
    ));
    assert!(matches!(
        views.decode("top-1"),
        Err(ConfiguratorError::FrameOutOfRange { frames: 1, .. })
    ));
}

#[test]
fn zero_frame_views_use_bare_name() {
    let views = shoe();
    assert_eq!(views.encode("sole", 0).unwrap(), "sole");
    assert_eq!(views.decode("sole").unwrap(), FrameKey::new("sole", 0));
    assert_eq!(views.decode("sole-0").unwrap(), FrameKey::new("sole", 0));
    assert_eq!(views.encode("top", 0).unwrap(), "top-0");
}

#[test]
fn view_names_with_numeric_suffix_decode() {
    let views = ViewMap::new([("detail-2", 1)]);
    assert_eq!(views.decode("detail-2").unwrap(), FrameKey::new("detail-2", 0));
    assert_eq!(views.decode("detail-2-0").unwrap(), FrameKey::new("detail-2", 0));
}

#[test]
fn keys_are_deterministic() {
    let views = ViewMap::new([("top", 1), ("side", 3)]);
    let keys: Vec<String> = views.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["side-0", "side-1", "side-2", "top-0"]);
}

#[test]
fn deserializes_from_json_object() {
    let views: ViewMap = serde_json::from_str(r#"{"side": 24, "top": 1}"#).unwrap();
    assert_eq!(views.frames("side"), Some(24));
    assert_eq!(views.positions("top"), Some(1));
}
