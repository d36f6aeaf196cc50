#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;

/// Results of batched compare-and-swap.
///
/// Defines [`CasMulti`] and the per-key [`CasStatus`].
pub mod cas;

/// Transport fault classification.
///
/// [`FaultClassifier`] sorts transport errors into [`Fault`]s; its fatal
/// table is a constructor parameter.
pub mod classify;

/// Declarative store configuration.
///
/// [`StoreConfig`] with humantime durations, [`Compression`] and
/// [`ConfigError`].
pub mod config;

/// Error types for store operations.
///
/// Defines [`CacheError`] which covers:
/// - Transport faults that were not swallowed
/// - Values the codec could not encode
/// - Invalid configuration
pub mod error;

mod guard;

/// Instrumentation hooks.
///
/// One [`CacheEvent`] per logical store call, delivered to an
/// [`Instrument`]. [`EventLog`] collects them in memory.
pub mod instrument;

mod local;

/// Injected logger for fault reports.
pub mod logger;

/// Metrics collection for store observability.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms per operation, outcome and transport.
pub mod metrics;

mod store;

pub use builder::{CacheStoreBuilder, DEFAULT_RACE_CONDITION_GRACE, DEFAULT_VALUE_SIZE_LIMIT};
pub use cas::{CasMulti, CasStatus};
pub use classify::{DEFAULT_FATAL, Fault, FaultClassifier};
pub use config::{Compression, ConfigError, StoreConfig};
pub use error::{CacheError, CacheResult};
pub use instrument::{CacheEvent, EventLog, Instrument, Operation, Outcome};
pub use logger::Logger;
pub use store::CacheStore;

pub use memstore_backend::{
    BincodeFormat, CasToken, Codec, CodecError, Compressor, FaultKind, Flags, Format, JsonFormat,
    PassthroughCompressor, Payload, Stats, Transport, TransportError, TransportResult, ValueFormat,
    Versioned,
};
#[cfg(feature = "gzip")]
pub use memstore_backend::GzipCompressor;
#[cfg(feature = "snappy")]
pub use memstore_backend::SnappyCompressor;
#[cfg(feature = "zstd")]
pub use memstore_backend::ZstdCompressor;
pub use memstore_core::{
    CacheKey, Clock, Entry, EntryMeta, KeyNormalizer, KeyPart, Options, SystemClock, TransportLabel, WireKey,
};
