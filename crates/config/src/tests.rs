use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k| map.get(k).cloned()
}

#[test]
fn defaults() {
    let o = Options::default();
    assert_eq!(o.max_segment_size, 10 * 1024 * 1024);
    assert_eq!(o.max_merge_segment_size, 100 * 1024 * 1024);
    assert!(!o.sync_on_put);
    assert_eq!(Options::new(), o);
}

#[test]
fn builder_setters() {
    let o = Options::new()
        .with_max_segment_size(64)
        .with_max_merge_segment_size(128)
        .with_sync_on_put(true);
    assert_eq!(o.max_segment_size, 64);
    assert_eq!(o.max_merge_segment_size, 128);
    assert!(o.sync_on_put);
}

#[test]
fn lookup_overrides_in_kib() {
    let o = Options::from_lookup(lookup_from(&[
        (ENV_MAX_SEGMENT_KB, "4"),
        (ENV_MAX_MERGE_SEGMENT_KB, " 16 "),
        (ENV_SYNC, "TRUE"),
    ]));
    assert_eq!(o.max_segment_size, 4096);
    assert_eq!(o.max_merge_segment_size, 16 * 1024);
    assert!(o.sync_on_put);
}

#[test]
fn empty_lookup_gives_defaults() {
    assert_eq!(Options::from_lookup(|_| None), Options::default());
}

#[test]
fn garbage_falls_back_to_defaults() {
    let o = Options::from_lookup(lookup_from(&[
        (ENV_MAX_SEGMENT_KB, "ten"),
        (ENV_MAX_MERGE_SEGMENT_KB, "-1"),
        (ENV_SYNC, "maybe"),
    ]));
    assert_eq!(o, Options::default());
}

#[test]
fn sync_accepts_common_spellings() {
    for (raw, want) in [("1", true), ("on", true), ("yes", true), ("0", false), ("off", false)] {
        let o = Options::from_lookup(lookup_from(&[(ENV_SYNC, raw)]));
        assert_eq!(o.sync_on_put, want, "{raw}");
    }
}

#[test]
fn huge_kib_saturates() {
    let o = Options::from_lookup(lookup_from(&[(ENV_MAX_SEGMENT_KB, &u64::MAX.to_string())]));
    assert_eq!(o.max_segment_size, u64::MAX);
}
