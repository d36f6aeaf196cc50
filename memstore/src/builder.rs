//! Builder for configuring [`CacheStore`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use memstore_backend::{Codec, Compressor, Format, JsonFormat, PassthroughCompressor, Transport, ValueFormat};
use memstore_core::{Clock, Options, SystemClock};

use crate::classify::FaultClassifier;
use crate::config::{ConfigError, StoreConfig};
use crate::instrument::Instrument;
use crate::logger::Logger;
use crate::store::{CacheStore, next_store_id};

/// How much longer than `expires_in` memcached keeps serialized entries by
/// default.
pub const DEFAULT_RACE_CONDITION_GRACE: Duration = Duration::from_secs(5 * 60);

/// Largest payload written by default, in bytes.
pub const DEFAULT_VALUE_SIZE_LIMIT: usize = 2 * 1024 * 1024;

/// Builder for creating and configuring a [`CacheStore`].
///
/// Use [`CacheStore::builder`] to create a new builder instance.
///
/// # Examples
///
/// ```
/// use memstore::{CacheStore, FaultClassifier};
/// use memstore_memory::MemoryTransport;
/// use std::time::Duration;
///
/// let cache = CacheStore::builder(MemoryTransport::new())
///     .namespace("sessions")
///     .expires_in(Duration::from_secs(3600))
///     .classifier(FaultClassifier::strict())
///     .build();
///
/// assert_eq!(cache.options().namespace.as_deref(), Some("sessions"));
/// ```
///
/// With bincode values and gzip compression:
///
/// ```ignore
/// use memstore::{BincodeFormat, CacheStore, GzipCompressor};
/// use memstore_memory::MemoryTransport;
///
/// let cache = CacheStore::builder(MemoryTransport::new())
///     .format(BincodeFormat)
///     .compressor(GzipCompressor::default())
///     .compress_threshold(1024)
///     .build();
/// ```
///
/// **Note:** [`GzipCompressor`](memstore_backend::GzipCompressor),
/// `ZstdCompressor` and `SnappyCompressor` require the `gzip`, `zstd` or
/// `snappy` feature.
pub struct CacheStoreBuilder<F = JsonFormat>
where
    F: Format,
{
    transport: Arc<dyn Transport>,
    format: F,
    compressor: Arc<dyn Compressor>,
    compress_threshold: Option<usize>,
    compress_raw: bool,
    defaults: Options,
    race_condition_grace: Duration,
    value_size_limit: Option<usize>,
    read_only: bool,
    swallow_exceptions: bool,
    classifier: FaultClassifier,
    logger: Logger,
    instrument: Option<Arc<dyn Instrument>>,
    clock: Arc<dyn Clock>,
}

impl CacheStoreBuilder<JsonFormat> {
    /// Creates a builder with default settings.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        CacheStoreBuilder {
            transport,
            format: JsonFormat,
            compressor: Arc::new(PassthroughCompressor),
            compress_threshold: None,
            compress_raw: false,
            defaults: Options::new(),
            race_condition_grace: DEFAULT_RACE_CONDITION_GRACE,
            value_size_limit: Some(DEFAULT_VALUE_SIZE_LIMIT),
            read_only: false,
            swallow_exceptions: true,
            classifier: FaultClassifier::default(),
            logger: Logger::disabled(),
            instrument: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl<F: Format> CacheStoreBuilder<F> {
    /// Sets the value serialization format.
    pub fn format<NewF: Format>(self, format: NewF) -> CacheStoreBuilder<NewF> {
        CacheStoreBuilder {
            transport: self.transport,
            format,
            compressor: self.compressor,
            compress_threshold: self.compress_threshold,
            compress_raw: self.compress_raw,
            defaults: self.defaults,
            race_condition_grace: self.race_condition_grace,
            value_size_limit: self.value_size_limit,
            read_only: self.read_only,
            swallow_exceptions: self.swallow_exceptions,
            classifier: self.classifier,
            logger: self.logger,
            instrument: self.instrument,
            clock: self.clock,
        }
    }

    /// Sets the compressor for serialized values.
    pub fn compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Arc::new(compressor);
        self
    }

    /// Serialized values smaller than `threshold` bytes are not compressed.
    pub fn compress_threshold(mut self, threshold: usize) -> Self {
        self.compress_threshold = Some(threshold);
        self
    }

    /// Compresses raw values as well, at any size.
    ///
    /// Raw values then stop working as memcached counters or concatenation
    /// targets: `increment`, `decrement`, `append`, `prepend` and
    /// `unless_exist` writes fail with
    /// [`CacheError::Unsupported`](crate::CacheError::Unsupported).
    pub fn compress_raw(mut self, compress_raw: bool) -> Self {
        self.compress_raw = compress_raw;
        self
    }

    /// Snappy-compresses every payload, raw values included.
    #[cfg(feature = "snappy")]
    pub fn snappy(mut self) -> Self {
        self.compressor = Arc::new(memstore_backend::SnappyCompressor);
        self.compress_threshold = None;
        self.compress_raw = true;
        self
    }

    /// Replaces the default options of every call.
    pub fn defaults(mut self, defaults: Options) -> Self {
        self.defaults = defaults;
        self
    }

    /// Namespace prepended to every key.
    pub fn namespace(mut self, namespace: impl AsRef<str>) -> Self {
        self.defaults = self.defaults.namespace(namespace.as_ref());
        self
    }

    /// Default logical lifetime of written entries.
    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.defaults = self.defaults.expires_in(expires_in);
        self
    }

    /// Default race-condition window for `fetch`.
    pub fn race_condition_ttl(mut self, ttl: Duration) -> Self {
        self.defaults = self.defaults.race_condition_ttl(ttl);
        self
    }

    /// Extra time memcached keeps serialized entries past `expires_in`.
    pub fn race_condition_grace(mut self, grace: Duration) -> Self {
        self.race_condition_grace = grace;
        self
    }

    /// Largest payload the store writes; `None` disables the check.
    pub fn value_size_limit(mut self, limit: Option<usize>) -> Self {
        self.value_size_limit = limit;
        self
    }

    /// Starts the store in read-only mode.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Whether transient faults are swallowed (default `true`).
    pub fn swallow_exceptions(mut self, swallow: bool) -> Self {
        self.swallow_exceptions = swallow;
        self
    }

    /// Sets the fault classifier.
    pub fn classifier(mut self, classifier: FaultClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets where faults are logged.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Sets the receiver of store events.
    pub fn instrument(mut self, instrument: impl Instrument + 'static) -> Self {
        self.instrument = Some(Arc::new(instrument));
        self
    }

    /// Sets the time source used for entry expiration.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Applies a [`StoreConfig`].
    ///
    /// Settings the configuration leaves unset keep their current value.
    /// Fails when the configured compression needs a feature that is off.
    pub fn config(self, config: StoreConfig) -> Result<CacheStoreBuilder<ValueFormat>, ConfigError> {
        let mut builder = self.format(config.format);
        builder.compressor = config.compression.to_compressor()?;
        builder.compress_threshold = config.compress_threshold.or(builder.compress_threshold);
        builder.compress_raw = config.compress_raw;
        if let Some(namespace) = &config.namespace {
            builder = builder.namespace(namespace);
        }
        if let Some(expires_in) = config.expires_in {
            builder = builder.expires_in(expires_in);
        }
        if let Some(ttl) = config.race_condition_ttl {
            builder = builder.race_condition_ttl(ttl);
        }
        builder.race_condition_grace = config.race_condition_grace;
        builder.value_size_limit = config.value_size_limit;
        builder.read_only = config.read_only;
        builder.swallow_exceptions = config.swallow_exceptions;
        if config.strict {
            builder.classifier = FaultClassifier::strict();
        }
        Ok(builder)
    }

    /// Builds the store.
    pub fn build(self) -> CacheStore<F> {
        let codec = Codec::new(self.format)
            .with_compressor(self.compressor)
            .with_compress_threshold(self.compress_threshold)
            .with_compress_raw(self.compress_raw);

        CacheStore {
            id: next_store_id(),
            transport: self.transport,
            codec,
            defaults: self.defaults,
            race_condition_grace: self.race_condition_grace,
            value_size_limit: self.value_size_limit,
            read_only: AtomicBool::new(self.read_only),
            swallow_exceptions: AtomicBool::new(self.swallow_exceptions),
            classifier: self.classifier,
            logger: self.logger,
            instrument: self.instrument,
            clock: self.clock,
        }
    }
}
