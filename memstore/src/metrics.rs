//! Store metrics.
//!
//! With the `metrics` feature every store call is recorded through the
//! [`metrics`](https://docs.rs/metrics) facade:
//!
//! - `memstore_operation_total` - calls per `operation`, `outcome` and `transport`
//! - `memstore_operation_duration_seconds` - call latency per `operation` and `transport`
//! - `memstore_operation_errors_total` - failed calls per `operation`, `kind` and `transport`
//!
//! Without the feature [`record_event`] compiles to nothing.

use crate::instrument::CacheEvent;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of store calls.
    pub static ref OPERATION_TOTAL: &'static str = {
        metrics::describe_counter!(
            "memstore_operation_total",
            "Total number of cache store operations."
        );
        "memstore_operation_total"
    };
    /// Histogram of store call duration.
    pub static ref OPERATION_DURATION: &'static str = {
        metrics::describe_histogram!(
            "memstore_operation_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of cache store operations in seconds."
        );
        "memstore_operation_duration_seconds"
    };
    /// Track number of failed store calls.
    pub static ref OPERATION_ERRORS: &'static str = {
        metrics::describe_counter!(
            "memstore_operation_errors_total",
            "Total number of cache store operations that ended in a fault."
        );
        "memstore_operation_errors_total"
    };
}

/// Records one store call.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_event(event: &CacheEvent) {
    let operation = event.operation.as_str();
    let transport = event.transport.to_string();

    metrics::counter!(
        *OPERATION_TOTAL,
        "operation" => operation,
        "outcome" => event.outcome.as_str(),
        "transport" => transport.clone()
    )
    .increment(1);

    metrics::histogram!(
        *OPERATION_DURATION,
        "operation" => operation,
        "transport" => transport.clone()
    )
    .record(event.elapsed.as_secs_f64());

    if let crate::instrument::Outcome::Error(kind) = event.outcome {
        let kind = kind.map(|kind| kind.as_str()).unwrap_or("codec");
        metrics::counter!(
            *OPERATION_ERRORS,
            "operation" => operation,
            "kind" => kind,
            "transport" => transport
        )
        .increment(1);
    }
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_event(_event: &CacheEvent) {}
