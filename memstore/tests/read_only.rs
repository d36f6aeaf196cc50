mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{harness, opts};
use memstore::{CacheError, CasStatus, Operation, Outcome};
use memstore_memory::TransportOp;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_writes_are_suppressed() {
    let h = harness();
    h.cache.write("foo", "bar", &opts()).await.unwrap();
    h.cache.set_read_only(true);
    h.events.clear();
    h.transport.reset_counters();

    assert!(h.cache.write("foo", "baz", &opts()).await.unwrap());
    assert!(h.cache.delete("foo", &opts()).await.unwrap());
    assert!(h.cache.append("foo", "x", &opts()).await.unwrap());
    assert!(h.cache.prepend("foo", "x", &opts()).await.unwrap());
    assert!(h.cache.clear().await.unwrap());

    assert_eq!(h.transport.total_calls(), 0);
    assert!(h.events.is_empty());
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("bar".to_owned())
    );
}

#[tokio::test]
async fn test_fetch_computes_without_writing() {
    let h = harness();
    h.cache.set_read_only(true);

    let value = h
        .cache
        .fetch("foo", &opts(), || async { Ok::<_, CacheError>("computed".to_owned()) })
        .await
        .unwrap();
    assert_eq!(value, "computed");
    assert!(h.transport.is_empty());
    assert_eq!(h.transport.write_calls(), 0);
    assert_eq!(h.operations(), vec![Operation::Fetch]);
}

#[tokio::test]
async fn test_fetch_leaves_expired_entry_alone() {
    let h = harness();
    h.cache
        .write("foo", "bar", &opts().expires_in(Duration::from_secs(60)))
        .await
        .unwrap();
    h.cache.set_read_only(true);
    h.advance(61);

    let options = opts().race_condition_ttl(Duration::from_secs(10));
    let value = h
        .cache
        .fetch("foo", &options, || async { Ok::<_, CacheError>("baz".to_owned()) })
        .await
        .unwrap();
    assert_eq!(value, "baz");

    let stored = h.cache.codec().decode_entry::<String>(&h.transport.peek("foo").unwrap());
    let stored = stored.unwrap();
    assert_eq!(stored.value(), "bar");
    assert_eq!(stored.expires_in(), Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn test_cas_runs_update_but_does_not_write() {
    let h = harness();
    h.cache.write("foo", "bar", &opts()).await.unwrap();
    h.cache.set_read_only(true);

    let mut seen = None;
    let swapped = h
        .cache
        .cas("foo", &opts(), |value: String| {
            seen = Some(value);
            "baz".to_owned()
        })
        .await
        .unwrap();

    assert!(swapped);
    assert_eq!(seen.as_deref(), Some("bar"));
    assert_eq!(h.transport.calls(TransportOp::Cas), 0);
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("bar".to_owned())
    );
    assert_eq!(h.events.events()[1].outcome, Outcome::Done);
}

#[tokio::test]
async fn test_cas_multi_skips_every_key() {
    let h = harness();
    h.cache.write("foo", "bar", &opts()).await.unwrap();
    h.cache.write("fud", "biz", &opts()).await.unwrap();
    h.cache.set_read_only(true);

    let result = h
        .cache
        .cas_multi(&["foo", "fud"], &opts(), |values: HashMap<&str, String>| {
            values
                .into_keys()
                .map(|key| (key, "changed".to_owned()))
                .collect()
        })
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.status(&"foo"), Some(CasStatus::Skipped));
    assert_eq!(result.status(&"fud"), Some(CasStatus::Skipped));
    assert_eq!(h.transport.calls(TransportOp::Cas), 0);
}

#[tokio::test]
async fn test_counters_are_not_suppressed() {
    let h = harness();
    h.cache.write("n", &1, &opts().raw()).await.unwrap();
    h.cache.set_read_only(true);

    assert_eq!(h.cache.increment("n", 1, &opts()).await.unwrap(), Some(2));
    assert_eq!(h.cache.decrement("n", 2, &opts()).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_read_only_from_builder() {
    let h = common::harness_with(|builder| builder.read_only(true));
    assert!(h.cache.read_only());
    assert!(h.cache.write("foo", "bar", &opts()).await.unwrap());
    assert!(h.transport.is_empty());

    h.cache.set_read_only(false);
    assert!(h.cache.write("foo", "bar", &opts()).await.unwrap());
    assert!(!h.transport.is_empty());
}
