mod common;

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use common::{harness, harness_with, opts};
use memstore::{BincodeFormat, CacheStore, Flags, Operation, Outcome, Payload};
use memstore_core::{CacheKey, KeyPart};
use memstore_memory::{MemoryTransport, TransportOp};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_write_read_delete() {
    let h = harness();
    assert!(h.cache.write("foo", "bar", &opts()).await.unwrap());
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("bar".to_owned())
    );

    assert!(h.cache.delete("foo", &opts()).await.unwrap());
    assert_eq!(h.cache.read::<String>("foo", &opts()).await.unwrap(), None);
    // Deleting an absent key still succeeds.
    assert!(h.cache.delete("foo", &opts()).await.unwrap());

    assert_eq!(
        h.operations(),
        vec![
            Operation::Write,
            Operation::Read,
            Operation::Delete,
            Operation::Read,
            Operation::Delete
        ]
    );
}

#[tokio::test]
async fn test_read_entry_carries_metadata() {
    let h = harness();
    let options = opts().expires_in(Duration::from_secs(60));
    h.cache.write("foo", &42u32, &options).await.unwrap();

    let entry = h.cache.read_entry::<u32>("foo", &opts()).await.unwrap().unwrap();
    assert_eq!(*entry.value(), 42);
    assert_eq!(entry.created_at(), common::start());
    assert_eq!(entry.expires_in(), Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn test_none_and_false_are_cached_values() {
    let h = harness();
    h.cache.write("nil", &None::<String>, &opts()).await.unwrap();
    h.cache.write("no", &false, &opts()).await.unwrap();

    assert!(h.cache.exist("nil", &opts()).await.unwrap());
    assert!(h.cache.exist("no", &opts()).await.unwrap());
    assert!(!h.cache.exist("missing", &opts()).await.unwrap());
    assert_eq!(h.cache.read::<bool>("no", &opts()).await.unwrap(), Some(false));
    assert_eq!(
        h.cache.read::<Option<String>>("nil", &opts()).await.unwrap(),
        Some(None)
    );

    let cache = CacheStore::builder(MemoryTransport::new())
        .format(BincodeFormat)
        .build();
    cache.write("foo", "bar", &opts()).await.unwrap();
    cache.write("nil", &None::<String>, &opts()).await.unwrap();
    cache.write("no", &false, &opts()).await.unwrap();

    assert_eq!(cache.read::<String>("foo", &opts()).await.unwrap(), Some("bar".to_owned()));
    assert!(cache.exist("foo", &opts()).await.unwrap());
    assert!(cache.exist("nil", &opts()).await.unwrap());
    assert!(cache.exist("no", &opts()).await.unwrap());
    assert!(!cache.exist("missing", &opts()).await.unwrap());
}

#[tokio::test]
async fn test_exist_follows_logical_expiry_with_bincode() {
    let h = harness();
    let cache = CacheStore::builder(h.transport.clone())
        .format(BincodeFormat)
        .clock(h.clock.clone())
        .build();
    let options = opts().expires_in(Duration::from_secs(60));
    cache.write("foo", &vec![1u32, 2, 3], &options).await.unwrap();
    cache.write("counter", &5u64, &opts().raw()).await.unwrap();

    assert!(cache.exist("foo", &opts()).await.unwrap());
    h.advance(61);
    assert!(!cache.exist("foo", &opts()).await.unwrap());
    assert!(cache.exist("counter", &opts()).await.unwrap());
}

#[tokio::test]
async fn test_entries_expire_logically() {
    let h = harness();
    let options = opts().expires_in(Duration::from_secs(60));
    h.cache.write("foo", "bar", &options).await.unwrap();

    h.advance(59);
    assert!(h.cache.read::<String>("foo", &opts()).await.unwrap().is_some());
    h.advance(2);
    assert_eq!(h.cache.read::<String>("foo", &opts()).await.unwrap(), None);
    assert!(!h.cache.exist("foo", &opts()).await.unwrap());

    // memcached still keeps the serialized entry for the grace period.
    assert!(h.transport.peek(&h.wire("foo")).is_some());
}

#[tokio::test]
async fn test_wire_ttl_includes_grace() {
    let h = harness();
    let options = opts().expires_in(Duration::from_secs(60));
    h.cache.write("foo", "bar", &options).await.unwrap();
    assert_eq!(h.transport.ttl_of("foo"), Some(Duration::from_secs(360)));

    let longer = options.clone().race_condition_ttl(Duration::from_secs(600));
    h.cache.write("foo", "bar", &longer).await.unwrap();
    assert_eq!(h.transport.ttl_of("foo"), Some(Duration::from_secs(660)));

    h.cache.write("counter", &1, &options.clone().raw()).await.unwrap();
    assert_eq!(h.transport.ttl_of("counter"), Some(Duration::from_secs(60)));

    h.cache.write("forever", "bar", &opts()).await.unwrap();
    assert_eq!(h.transport.ttl_of("forever"), None);
}

#[tokio::test]
async fn test_unless_exist() {
    let h = harness();
    assert!(h.cache.write("foo", "bar", &opts().unless_exist()).await.unwrap());
    assert!(!h.cache.write("foo", "baz", &opts().unless_exist()).await.unwrap());
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("bar".to_owned())
    );

    let events = h.events.events();
    assert_eq!(events[1].outcome, Outcome::NotStored);
}

#[tokio::test]
async fn test_raw_values() {
    let h = harness();
    h.cache.write("foo", &7, &opts().raw()).await.unwrap();

    let payload = h.transport.peek("foo").unwrap();
    assert_eq!(payload.flags, Flags::RAW);
    assert_eq!(payload.data, Bytes::from_static(b"7"));
    assert_eq!(h.cache.read::<u64>("foo", &opts()).await.unwrap(), Some(7));
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("7".to_owned())
    );
}

#[tokio::test]
async fn test_read_multi() {
    let h = harness();
    h.cache.write("foo", "bar", &opts()).await.unwrap();
    h.cache.write("fu", "baz", &opts()).await.unwrap();

    let found: HashMap<&str, String> = h
        .cache
        .read_multi(&["foo", "fu", "missing"], &opts())
        .await
        .unwrap();
    assert_eq!(
        found,
        HashMap::from([("foo", "bar".to_owned()), ("fu", "baz".to_owned())])
    );
    assert_eq!(h.transport.calls(TransportOp::GetMulti), 1);

    let event = h.events.events().pop().unwrap();
    assert_eq!(event.operation, Operation::ReadMulti);
    assert_eq!(event.hits, 2);
    assert_eq!(event.keys.len(), 3);
}

#[tokio::test]
async fn test_read_multi_skips_expired() {
    let h = harness();
    h.cache
        .write("short", "a", &opts().expires_in(Duration::from_secs(10)))
        .await
        .unwrap();
    h.cache.write("long", "b", &opts()).await.unwrap();
    h.advance(11);

    let found: HashMap<&str, String> = h
        .cache
        .read_multi(&["short", "long"], &opts())
        .await
        .unwrap();
    assert_eq!(found, HashMap::from([("long", "b".to_owned())]));
}

#[tokio::test]
async fn test_read_multi_of_nothing() {
    let h = harness();
    let keys: [&str; 0] = [];
    let found: HashMap<&str, String> = h.cache.read_multi(&keys, &opts()).await.unwrap();
    assert!(found.is_empty());
    assert_eq!(h.transport.total_calls(), 0);
    assert_eq!(h.events.events()[0].outcome, Outcome::Miss);
}

#[tokio::test]
async fn test_increment_decrement() {
    let h = harness();
    assert_eq!(h.cache.increment("n", 1, &opts()).await.unwrap(), None);
    assert_eq!(h.cache.decrement("n", 1, &opts()).await.unwrap(), None);

    h.cache.write("n", &1, &opts().raw()).await.unwrap();
    assert_eq!(h.cache.increment("n", 1, &opts()).await.unwrap(), Some(2));
    assert_eq!(h.cache.increment("n", 5, &opts()).await.unwrap(), Some(7));
    assert_eq!(h.cache.decrement("n", 3, &opts()).await.unwrap(), Some(4));
    assert_eq!(h.cache.decrement("n", 10, &opts()).await.unwrap(), Some(0));
    assert_eq!(h.cache.read::<u64>("n", &opts()).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_append_prepend() {
    let h = harness();
    assert!(!h.cache.append("s", "x", &opts()).await.unwrap());

    h.cache.write("s", "mid", &opts().raw()).await.unwrap();
    assert!(h.cache.append("s", ">", &opts()).await.unwrap());
    assert!(h.cache.prepend("s", b"<", &opts()).await.unwrap());
    assert_eq!(
        h.cache.read::<String>("s", &opts()).await.unwrap(),
        Some("<mid>".to_owned())
    );
}

#[tokio::test]
async fn test_namespace() {
    let h = harness_with(|builder| builder.namespace("app"));
    h.cache.write("foo", "bar", &opts()).await.unwrap();
    assert_eq!(h.transport.keys(), vec!["app:foo".to_owned()]);

    h.cache
        .write("foo", "baz", &opts().namespace("other"))
        .await
        .unwrap();
    assert!(h.transport.peek("other:foo").is_some());
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("bar".to_owned())
    );
}

#[tokio::test]
async fn test_crazy_keys_round_trip() {
    let h = harness();
    let keys = [
        "#/:*(<+=> )&$%@?;'\"\u{0}",
        "héllo wörld",
        "ƒøø",
        "tab\tand\nnewline",
    ];
    for key in keys {
        h.cache.write(key, key, &opts()).await.unwrap();
    }
    for key in keys {
        assert_eq!(
            h.cache.read::<String>(key, &opts()).await.unwrap().as_deref(),
            Some(key)
        );
    }
    for wire in h.transport.keys() {
        assert!(wire.bytes().all(|b| b > 0x20 && b < 0x7F), "{wire}");
    }
}

#[tokio::test]
async fn test_long_keys_are_hashed() {
    let h = harness();
    let key = "x".repeat(300);
    h.cache.write(key.as_str(), "bar", &opts()).await.unwrap();

    let wire = h.cache.normalize_key(key.as_str(), &opts());
    assert!(wire.is_hashed());
    assert!(wire.len() <= 250);
    assert_eq!(
        h.cache.read::<String>(key.as_str(), &opts()).await.unwrap(),
        Some("bar".to_owned())
    );
}

#[tokio::test]
async fn test_compound_keys() {
    let h = harness();
    let key = CacheKey::from_parts(vec![
        KeyPart::new("user", Some("42")),
        KeyPart::new("page", Some("home")),
    ]);
    h.cache.write(&key, "bar", &opts()).await.unwrap();
    assert_eq!(h.transport.keys(), vec!["user=42/page=home".to_owned()]);
    assert_eq!(
        h.cache.read::<String>(key, &opts()).await.unwrap(),
        Some("bar".to_owned())
    );
}

#[tokio::test]
async fn test_values_over_the_size_limit_are_not_stored() {
    let h = harness_with(|builder| builder.value_size_limit(Some(64)));
    let big = "x".repeat(100);
    assert!(!h.cache.write("big", &big, &opts()).await.unwrap());
    assert!(h.transport.is_empty());
    assert_eq!(h.events.events()[0].outcome, Outcome::NotStored);

    let unlimited = harness_with(|builder| builder.value_size_limit(None));
    assert!(unlimited.cache.write("big", &big, &opts()).await.unwrap());
}

#[tokio::test]
async fn test_legacy_unflagged_payloads() {
    let h = harness();
    h.transport.insert(
        h.cache.normalize_key("old", &opts()),
        Payload::new(Bytes::from_static(b"\"value\""), Flags::NONE),
        None,
    );
    assert_eq!(
        h.cache.read::<String>("old", &opts()).await.unwrap(),
        Some("value".to_owned())
    );
}

#[tokio::test]
async fn test_undecodable_payload_is_a_miss() {
    let h = harness();
    let wire = h.cache.normalize_key("broken", &opts());
    h.transport.insert(
        wire,
        Payload::new(
            Bytes::from_static(b"not gzip at all"),
            Flags::SERIALIZED | Flags::COMPRESSED,
        ),
        None,
    );
    assert_eq!(h.cache.read::<String>("broken", &opts()).await.unwrap(), None);
    assert_eq!(h.events.events()[0].outcome, Outcome::Miss);
}

#[cfg(feature = "gzip")]
#[tokio::test]
async fn test_compressed_values() {
    use memstore::GzipCompressor;

    let h = harness_with(|builder| {
        builder
            .compressor(GzipCompressor::default())
            .compress_threshold(16)
    });
    let text = "compressible ".repeat(100);
    h.cache.write("big", &text, &opts()).await.unwrap();
    h.cache.write("small", "tiny", &opts()).await.unwrap();

    let big = h.transport.peek("big").unwrap();
    assert!(big.flags.contains(Flags::COMPRESSED));
    assert!(big.len() < text.len());
    assert!(!h.transport.peek("small").unwrap().flags.contains(Flags::COMPRESSED));
    assert_eq!(h.cache.read::<String>("big", &opts()).await.unwrap(), Some(text));

    h.cache
        .write("plain", &"y".repeat(100), &opts().compress(false))
        .await
        .unwrap();
    assert!(!h.transport.peek("plain").unwrap().flags.contains(Flags::COMPRESSED));
}

#[tokio::test]
async fn test_clear_stats_reset() {
    let h = harness();
    h.cache.write("foo", "bar", &opts()).await.unwrap();

    let stats = h.cache.stats().await.unwrap();
    assert_eq!(stats["memory"]["curr_items"], "1");

    assert!(h.cache.clear().await.unwrap());
    assert!(h.transport.is_empty());
    assert!(h.cache.reset().await.unwrap());
    assert_eq!(
        h.operations()[1..].to_vec(),
        vec![Operation::Stats, Operation::Clear, Operation::Reset]
    );
}

#[tokio::test]
async fn test_default_store() {
    let cache = CacheStore::new(MemoryTransport::new());
    assert!(!cache.read_only());
    assert!(cache.swallow_exceptions());
    assert_eq!(cache.race_condition_grace(), Duration::from_secs(300));
    assert_eq!(cache.value_size_limit(), Some(2 * 1024 * 1024));
    assert_eq!(cache.label().as_str(), "memory");
}
