mod common;

use std::time::Duration;

use common::{Harness, harness, opts};
use memstore::{CacheError, Operation, Options, Outcome};
use memstore_memory::TransportOp;
use pretty_assertions::assert_eq;

#[derive(Debug)]
enum Failure {
    Cache(CacheError),
    Boom,
}

impl From<CacheError> for Failure {
    fn from(error: CacheError) -> Self {
        Failure::Cache(error)
    }
}

fn race(secs: u64) -> Options {
    opts().race_condition_ttl(Duration::from_secs(secs))
}

async fn seeded() -> Harness {
    let h = harness();
    h.cache
        .write("foo", "bar", &opts().expires_in(Duration::from_secs(60)))
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn test_fetch_hit() {
    let h = seeded().await;
    let value = h
        .cache
        .fetch("foo", &opts(), || async { Ok::<_, CacheError>("baz".to_owned()) })
        .await
        .unwrap();
    assert_eq!(value, "bar");

    let event = h.events.events().pop().unwrap();
    assert_eq!(event.operation, Operation::Fetch);
    assert_eq!(event.outcome, Outcome::Hit);
    assert_eq!(event.hits, 1);
}

#[tokio::test]
async fn test_fetch_miss_writes_computed_value() {
    let h = harness();
    let options = opts().expires_in(Duration::from_secs(60));
    let value = h
        .cache
        .fetch("foo", &options, || async { Ok::<_, CacheError>(7u32) })
        .await
        .unwrap();
    assert_eq!(value, 7);
    assert_eq!(h.cache.read::<u32>("foo", &opts()).await.unwrap(), Some(7));
    assert_eq!(h.transport.ttl_of("foo"), Some(Duration::from_secs(360)));
    assert_eq!(h.events.events()[0].outcome, Outcome::Miss);
}

#[tokio::test]
async fn test_fetch_caches_none() {
    let h = harness();
    let mut calls = 0;
    for _ in 0..2 {
        let value = h
            .cache
            .fetch("nil", &opts(), || {
                calls += 1;
                async { Ok::<Option<String>, CacheError>(None) }
            })
            .await
            .unwrap();
        assert_eq!(value, None);
    }
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_fetch_force_recomputes() {
    let h = seeded().await;
    let value = h
        .cache
        .fetch("foo", &opts().force(), || async {
            Ok::<_, CacheError>("baz".to_owned())
        })
        .await
        .unwrap();
    assert_eq!(value, "baz");
    assert_eq!(h.transport.calls(TransportOp::Get), 0);
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("baz".to_owned())
    );
}

#[tokio::test]
async fn test_stale_value_served_while_recomputing() {
    let h = seeded().await;
    h.advance(61);

    let value = h
        .cache
        .fetch("foo", &race(10), || async {
            let seen = h.cache.read::<String>("foo", &opts()).await?;
            assert_eq!(seen.as_deref(), Some("bar"));
            Ok::<_, CacheError>("baz".to_owned())
        })
        .await
        .unwrap();
    assert_eq!(value, "baz");
    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("baz".to_owned())
    );
}

#[tokio::test]
async fn test_entry_past_the_window_is_gone() {
    let h = seeded().await;
    h.advance(71);

    let value = h
        .cache
        .fetch("foo", &race(10), || async {
            let seen = h.cache.read::<String>("foo", &opts()).await?;
            assert_eq!(seen, None);
            Ok::<_, CacheError>("baz".to_owned())
        })
        .await
        .unwrap();
    assert_eq!(value, "baz");
    assert_eq!(h.transport.calls(TransportOp::Delete), 1);
}

#[tokio::test]
async fn test_failed_recompute_keeps_stale_value_for_the_window() {
    let h = seeded().await;
    h.advance(61);

    let result = h
        .cache
        .fetch("foo", &race(10), || async { Err::<String, _>(Failure::Boom) })
        .await;
    assert!(matches!(result, Err(Failure::Boom)));
    assert_eq!(h.events.events().pop().unwrap().outcome, Outcome::Miss);

    assert_eq!(
        h.cache.read::<String>("foo", &opts()).await.unwrap(),
        Some("bar".to_owned())
    );
    assert_eq!(h.transport.ttl_of("foo"), Some(Duration::from_secs(20)));

    h.advance(30);
    assert_eq!(h.cache.read::<String>("foo", &opts()).await.unwrap(), None);
}

#[tokio::test]
async fn test_expired_without_window_is_deleted() {
    let h = seeded().await;
    h.advance(61);

    let result = h
        .cache
        .fetch("foo", &opts(), || async { Err::<String, _>(Failure::Boom) })
        .await;
    assert!(matches!(result, Err(Failure::Boom)));
    assert!(h.transport.peek("foo").is_none());
}

#[tokio::test]
async fn test_fetch_propagates_fatal_read_errors() {
    let h = seeded().await;
    h.transport
        .fail(TransportOp::Get, memstore::FaultKind::NoServersDefined);

    let mut called = false;
    let result = h
        .cache
        .fetch("foo", &opts(), || {
            called = true;
            async { Ok::<_, Failure>("baz".to_owned()) }
        })
        .await;
    assert!(matches!(result, Err(Failure::Cache(_))));
    assert!(!called);
    assert_eq!(
        h.events.events().pop().unwrap().outcome,
        Outcome::Error(Some(memstore::FaultKind::NoServersDefined))
    );
}
