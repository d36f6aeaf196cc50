mod common;

use std::collections::HashMap;

use common::logs::capture;
use common::{harness, harness_with, opts};
use memstore::{CacheError, FaultClassifier, FaultKind, Outcome};
use memstore_memory::TransportOp;
use pretty_assertions::assert_eq;
use tracing::Level;

#[tokio::test]
async fn test_transient_faults_are_swallowed_and_logged() {
    let (logger, logs) = capture();
    let h = harness_with(|builder| builder.logger(logger));
    h.transport.fail(TransportOp::Get, FaultKind::Timeout);

    assert_eq!(h.cache.read::<String>("foo", &opts()).await.unwrap(), None);

    let warnings = logs.with_message("memcached error");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::WARN);
    assert_eq!(warnings[0].field("operation"), Some("read"));
    assert_eq!(warnings[0].field("key"), Some("foo"));
    assert!(warnings[0].field("error").is_some());

    assert_eq!(
        h.events.events()[0].outcome,
        Outcome::Error(Some(FaultKind::Timeout))
    );
}

#[tokio::test]
async fn test_safe_defaults_per_operation() {
    let h = harness();
    h.cache.write("n", &1, &opts().raw()).await.unwrap();
    h.transport.fail_all(FaultKind::ConnectionReset);

    assert!(!h.cache.write("foo", "bar", &opts()).await.unwrap());
    assert!(!h.cache.delete("foo", &opts()).await.unwrap());
    assert!(!h.cache.exist("n", &opts()).await.unwrap());
    assert_eq!(h.cache.increment("n", 1, &opts()).await.unwrap(), None);
    assert!(!h.cache.append("n", "1", &opts()).await.unwrap());
    assert!(!h.cache.cas("n", &opts(), |n: u64| n + 1).await.unwrap());
    assert!(!h.cache.clear().await.unwrap());
    assert!(h.cache.stats().await.unwrap().is_empty());
    assert!(!h.cache.reset().await.unwrap());

    let found: HashMap<&str, u64> = h.cache.read_multi(&["n"], &opts()).await.unwrap();
    assert!(found.is_empty());

    for event in h.events.events().iter().skip(1) {
        assert!(event.outcome.is_error(), "{:?}", event.operation);
    }
}

#[tokio::test]
async fn test_fetch_computes_when_the_read_fails() {
    let h = harness();
    h.transport.fail(TransportOp::Get, FaultKind::Timeout);

    let value = h
        .cache
        .fetch("foo", &opts(), || async { Ok::<_, CacheError>("computed".to_owned()) })
        .await
        .unwrap();
    assert_eq!(value, "computed");
    assert!(h.transport.peek("foo").is_some());
}

#[tokio::test]
async fn test_transient_faults_propagate_when_not_swallowed() {
    let (logger, logs) = capture();
    let h = harness_with(|builder| builder.logger(logger).swallow_exceptions(false));
    h.transport.fail(TransportOp::Set, FaultKind::Timeout);

    let error = h.cache.write("foo", "bar", &opts()).await.unwrap_err();
    assert!(matches!(error, CacheError::Transport(_)));
    assert_eq!(error.fault_kind(), Some(FaultKind::Timeout));
    assert!(logs.with_message("memcached error").is_empty());
    assert_eq!(
        h.events.events()[0].outcome,
        Outcome::Error(Some(FaultKind::Timeout))
    );
}

#[tokio::test]
async fn test_conditional_outcomes_are_never_errors() {
    let h = harness_with(|builder| builder.swallow_exceptions(false));

    assert!(h.cache.delete("missing", &opts()).await.unwrap());
    assert_eq!(h.cache.increment("missing", 1, &opts()).await.unwrap(), None);
    assert!(!h.cache.prepend("missing", "x", &opts()).await.unwrap());
    h.cache.write("foo", "bar", &opts()).await.unwrap();
    assert!(!h.cache.write("foo", "bar", &opts().unless_exist()).await.unwrap());
}

#[tokio::test]
async fn test_fatal_faults_always_propagate() {
    let (logger, logs) = capture();
    let h = harness_with(|builder| builder.logger(logger));
    h.transport.fail(TransportOp::Get, FaultKind::NoServersDefined);

    let error = h.cache.read::<String>("foo", &opts()).await.unwrap_err();
    assert_eq!(error.fault_kind(), Some(FaultKind::NoServersDefined));

    let errors = logs.at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "memcached fatal error");
    assert!(logs.with_message("memcached error").is_empty());
}

#[tokio::test]
async fn test_swallowing_can_be_switched_at_runtime() {
    let h = harness();
    h.transport.fail(TransportOp::Get, FaultKind::ServerError);

    assert_eq!(h.cache.read::<String>("foo", &opts()).await.unwrap(), None);
    h.cache.set_swallow_exceptions(false);
    assert!(h.cache.read::<String>("foo", &opts()).await.is_err());
    h.cache.set_swallow_exceptions(true);
    assert_eq!(h.cache.read::<String>("foo", &opts()).await.unwrap(), None);
}

#[tokio::test]
async fn test_classifier_is_configurable() {
    let strict = harness_with(|builder| builder.classifier(FaultClassifier::strict()));
    strict.transport.fail(TransportOp::Get, FaultKind::Timeout);
    assert!(strict.cache.read::<String>("foo", &opts()).await.is_err());

    let lenient = harness_with(|builder| {
        builder.classifier(FaultClassifier::default().without_fatal(FaultKind::ConnectionFailure))
    });
    lenient
        .transport
        .fail(TransportOp::Get, FaultKind::ConnectionFailure);
    assert_eq!(
        lenient.cache.read::<String>("foo", &opts()).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_disabled_logger_is_silent() {
    let (_, logs) = capture();
    let h = harness();
    h.transport.fail(TransportOp::Get, FaultKind::Timeout);
    assert!(!h.cache.logger().is_enabled());

    h.cache.read::<String>("foo", &opts()).await.unwrap();
    assert!(logs.records().is_empty());
}

#[tokio::test]
async fn test_undecodable_payloads_are_logged_at_debug() {
    let (logger, logs) = capture();
    let h = harness_with(|builder| builder.logger(logger));
    h.cache.write("foo", &[1, 2, 3], &opts()).await.unwrap();

    assert_eq!(h.cache.read::<String>("foo", &opts()).await.unwrap(), None);
    let debug = logs.with_message("undecodable payload, treated as a miss");
    assert_eq!(debug.len(), 1);
    assert_eq!(debug[0].level, Level::DEBUG);
}
