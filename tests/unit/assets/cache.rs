use super::*;
use crate::assets::image::solid;
use crate::assets::source::MemorySource;

fn key(p: u32) -> FrameKey {
    FrameKey::new("side", p)
}

#[test]
fn identical_requests_fetch_once() {
    let mut src = MemorySource::new();
    src.insert("u0", solid(1, 1, [1, 1, 1, 255]));
    let mut ids = FetchIds::default();
    let mut cache = SlotCache::new("frames");

    assert_eq!(
        cache.request(&key(0), "u0", &mut ids, &mut src),
        SlotRequest::Started
    );
    assert_eq!(
        cache.request(&key(0), "u0", &mut ids, &mut src),
        SlotRequest::InFlight
    );

    let fetched = src.poll().pop().unwrap();
    let done = cache.complete(fetched.id, fetched.result).unwrap();
    assert_eq!(done.key, key(0));
    assert_eq!(cache.status(&key(0)), SlotStatus::Loaded);

    assert_eq!(
        cache.request(&key(0), "u0", &mut ids, &mut src),
        SlotRequest::Hit
    );
    assert_eq!(src.begun("u0"), 1);
}

#[test]
fn new_url_resets_slot_and_aborts_old_fetch() {
    let mut src = MemorySource::holding();
    let mut ids = FetchIds::default();
    let mut cache = SlotCache::new("frames");

    cache.request(&key(0), "u0", &mut ids, &mut src);
    let old = FetchId(1);
    assert!(cache.owns(old));
    assert_eq!(
        cache.request(&key(0), "u1", &mut ids, &mut src),
        SlotRequest::Started
    );
    assert!(!cache.owns(old));
    assert!(cache.owns(FetchId(2)));
    assert_eq!(src.aborted(), vec!["u0"]);
    assert!(cache.complete(old, Ok(solid(1, 1, [0, 0, 0, 255]))).is_none());
    assert_eq!(cache.get(&key(0)).unwrap().url(), Some("u1"));
}

#[test]
fn failure_invalidates_url_for_retry() {
    let mut src = MemorySource::new();
    src.fail("u0");
    let mut ids = FetchIds::default();
    let mut cache = SlotCache::new("frames");

    cache.request(&key(0), "u0", &mut ids, &mut src);
    let fetched = src.poll().pop().unwrap();
    let done = cache.complete(fetched.id, fetched.result).unwrap();
    assert!(done.result.is_err());
    assert_eq!(cache.status(&key(0)), SlotStatus::Unloaded);
    assert_eq!(cache.get(&key(0)).unwrap().url(), None);

    assert_eq!(
        cache.request(&key(0), "u0", &mut ids, &mut src),
        SlotRequest::Started
    );
}

#[test]
fn cancel_only_touches_loading_slots() {
    let mut src = MemorySource::holding();
    src.insert("u0", solid(1, 1, [0, 0, 0, 255]));
    let mut ids = FetchIds::default();
    let mut cache = SlotCache::new("frames");

    cache.request(&key(0), "u0", &mut ids, &mut src);
    cache.request(&key(1), "u1", &mut ids, &mut src);
    src.complete("u0");
    for f in src.poll() {
        cache.complete(f.id, f.result);
    }

    assert!(!cache.cancel(&key(0), &mut src));
    assert!(cache.cancel(&key(1), &mut src));
    assert_eq!(cache.status(&key(0)), SlotStatus::Loaded);
    assert_eq!(cache.status(&key(1)), SlotStatus::Canceled);
    assert_eq!(cache.get(&key(1)).unwrap().url(), None);
    assert_eq!(src.aborted(), vec!["u1"]);
    assert!(!cache.owns(FetchId(2)));
}

#[test]
fn clear_aborts_everything() {
    let mut src = MemorySource::holding();
    let mut ids = FetchIds::default();
    let mut cache = SlotCache::new("masks");
    cache.request(&key(0), "m0", &mut ids, &mut src);
    cache.request(&key(1), "m1", &mut ids, &mut src);
    cache.clear(&mut src);
    assert_eq!(src.aborted(), vec!["m0", "m1"]);
    assert!(cache.get(&key(0)).is_none());
}
