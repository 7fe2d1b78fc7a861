use pdl2pdf::naming::{safe_file_name_part, timestamp_stem, OutputTarget, DEFAULT_REPLACEMENT};
use std::path::Path;
use std::time::Duration;
use time::macros::datetime;

const ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_,.-=+!@$()";

#[test]
fn allowed_characters_pass_through() {
    assert_eq!(safe_file_name_part(ALLOWED, DEFAULT_REPLACEMENT), ALLOWED);
}

#[test]
fn unsafe_characters_are_replaced_one_for_one() {
    let input = "Invoice 2024/03: \"Müller\" <draft>*?";
    let out = safe_file_name_part(input, DEFAULT_REPLACEMENT);
    assert_eq!(out, "Invoice_2024_03___M_ller___draft___");
    assert_eq!(out.chars().count(), input.chars().count());
    for (a, b) in input.chars().zip(out.chars()) {
        assert!(a == b || b == DEFAULT_REPLACEMENT, "{a:?} -> {b:?}");
    }
}

#[test]
fn replacement_is_configurable_and_not_collapsed() {
    assert_eq!(safe_file_name_part("a  b\t\nc", '-'), "a--b--c");
    assert_eq!(safe_file_name_part("", '-'), "");
    assert_eq!(safe_file_name_part("日本語", 'x'), "xxx");
}

#[test]
fn stem_is_sortable_millisecond_timestamp() {
    let stem = timestamp_stem(datetime!(2024-03-07 09:05:03.042 +01:00)).unwrap();
    assert_eq!(stem, "20240307_090503_042");
}

#[test]
fn target_without_title() {
    let dir = Path::new("/srv/out");
    let t = OutputTarget::new(dir, None, datetime!(2024-12-31 23:59:59.999 UTC)).unwrap();
    assert_eq!(t.path(), Path::new("/srv/out/20241231_235959_999.pdf"));
}

#[test]
fn target_with_sanitized_title() {
    let dir = Path::new("/srv/out");
    let now = datetime!(2024-01-02 03:04:05.006 UTC);
    let t = OutputTarget::new(dir, Some("Q1 report/final"), now).unwrap();
    assert_eq!(
        t.path(),
        Path::new("/srv/out/20240102_030405_006-Q1_report_final.pdf")
    );
    assert_eq!(t.path().parent(), Some(dir));
}

#[test]
fn empty_title_is_ignored() {
    let dir = Path::new("/srv/out");
    let now = datetime!(2024-01-02 03:04:05.006 UTC);
    let a = OutputTarget::new(dir, Some(""), now).unwrap();
    let b = OutputTarget::new(dir, None, now).unwrap();
    assert_eq!(a, b);
}

#[test]
fn one_millisecond_apart_never_collide() {
    let dir = Path::new("/srv/out");
    let base = datetime!(2024-06-30 23:59:59.999 UTC);
    let mut seen = std::collections::HashSet::new();
    for ms in 0..2500u64 {
        let now = base + Duration::from_millis(ms);
        let t = OutputTarget::new(dir, Some("job"), now).unwrap();
        let name = t.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.ends_with(".pdf"));
        assert!(seen.insert(name), "collision at +{ms}ms");
    }
}

#[test]
fn same_millisecond_distinguished_by_title() {
    let dir = Path::new("/srv/out");
    let now = datetime!(2024-06-30 12:00:00.500 UTC);
    let a = OutputTarget::new(dir, Some("a"), now).unwrap();
    let b = OutputTarget::new(dir, Some("b"), now).unwrap();
    assert_ne!(a, b);
}
