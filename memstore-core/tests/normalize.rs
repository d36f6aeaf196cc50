//! Tests for wire key normalization.

use memstore_core::{CacheKey, KeyNormalizer, KeyPart, MAX_KEY_LENGTH, TRUNCATED_KEY_LENGTH};
use pretty_assertions::assert_eq;

#[test]
fn test_normalize_is_idempotent() {
    let key = CacheKey::from("some key with spaces");
    let first = KeyNormalizer::normalize(&key, Some("ns"));
    for _ in 0..10 {
        assert_eq!(KeyNormalizer::normalize(&key, Some("ns")), first);
    }
}

#[test]
fn test_namespace_is_joined_with_colon() {
    let key = CacheKey::from("key");
    assert_eq!(KeyNormalizer::normalize(&key, Some("foo:")).as_str(), "foo::key");
    assert_eq!(KeyNormalizer::normalize(&key, None).as_str(), "key");
    assert_eq!(KeyNormalizer::normalize(&key, Some("")).as_str(), "key");
}

#[test]
fn test_crazy_key_characters() {
    let key = CacheKey::from("#/:*(<+=> )&$%@?;'\"'`~-");
    let wire = KeyNormalizer::normalize(&key, None);
    assert_eq!(wire.as_str(), "#/:*(<+=>%20)&$%25@?;'\"'`~-");
    assert!(wire.as_bytes().iter().all(|b| b.is_ascii_graphic()));
}

#[test]
fn test_utf8_key_escapes_each_byte() {
    let key = CacheKey::from("\u{fc}mlaut");
    assert_eq!(KeyNormalizer::normalize(&key, None).as_str(), "%C3%BCmlaut");
}

#[test]
fn test_escaping_is_injective_for_percent() {
    let literal = KeyNormalizer::normalize(&CacheKey::from("%20"), None);
    let space = KeyNormalizer::normalize(&CacheKey::from(" "), None);
    assert_ne!(literal, space);
    assert_eq!(literal.as_str(), "%2520");
    assert_eq!(space.as_str(), "%20");
}

#[test]
fn test_really_long_key_is_hashed() {
    let key = CacheKey::new("x".repeat(900));
    let wire = KeyNormalizer::normalize(&key, None);

    assert!(wire.len() <= MAX_KEY_LENGTH);
    assert!(wire.is_hashed());
    let (prefix, digest) = wire.as_str().split_once(":md5:").unwrap();
    assert_eq!(prefix, "x".repeat(TRUNCATED_KEY_LENGTH));
    assert_eq!(digest.len(), 32);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(digest, format!("{:x}", md5::compute("x".repeat(900))));
}

#[test]
fn test_long_keys_differing_after_truncation_stay_distinct() {
    let base = "y".repeat(899);
    let a = KeyNormalizer::normalize(&CacheKey::new(format!("{base}a")), None);
    let b = KeyNormalizer::normalize(&CacheKey::new(format!("{base}b")), None);

    assert_eq!(a.as_str()[..TRUNCATED_KEY_LENGTH], b.as_str()[..TRUNCATED_KEY_LENGTH]);
    assert_ne!(a, b);
}

#[test]
fn test_length_guard_applies_after_escaping_and_namespace() {
    // 100 spaces escape to 300 bytes.
    let key = CacheKey::new(" ".repeat(100));
    let wire = KeyNormalizer::normalize(&key, None);
    assert!(wire.is_hashed());
    assert_eq!(
        &wire.as_str()[TRUNCATED_KEY_LENGTH + 5..],
        format!("{:x}", md5::compute("%20".repeat(100)))
    );

    // The namespace pushes a 245 byte key over the limit.
    let key = CacheKey::new("z".repeat(245));
    assert!(!KeyNormalizer::normalize(&key, None).is_hashed());
    assert!(KeyNormalizer::normalize(&key, Some("namespace")).is_hashed());
}

#[test]
fn test_composite_keys_expand_before_escaping() {
    let key = CacheKey::from_parts(vec![
        KeyPart::new("views", None::<&str>),
        KeyPart::new("title", Some("hello world")),
    ]);
    assert_eq!(
        KeyNormalizer::normalize(&key, Some("app")).as_str(),
        "app:views/title=hello%20world"
    );
}
