//! Declarative store configuration.
//!
//! [`StoreConfig`] can be deserialized from any serde format. Durations use
//! humantime notation (`"90s"`, `"5m"`, `"1h 30m"`).
//!
//! ```
//! use memstore::{Compression, StoreConfig};
//! use std::time::Duration;
//!
//! let config: StoreConfig = serde_json::from_str(r#"{
//!     "namespace": "app",
//!     "expires_in": "10m",
//!     "compression": { "type": "Gzip" }
//! }"#).unwrap();
//!
//! assert_eq!(config.expires_in, Some(Duration::from_secs(600)));
//! assert_eq!(config.compression, Compression::Gzip { level: 6 });
//! assert!(config.swallow_exceptions);
//! ```

use std::sync::Arc;
use std::time::Duration;

use memstore_backend::{Compressor, PassthroughCompressor, Transport, ValueFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::{CacheStoreBuilder, DEFAULT_RACE_CONDITION_GRACE, DEFAULT_VALUE_SIZE_LIMIT};
use crate::store::CacheStore;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configured codec needs a crate feature that is not enabled.
    #[error("{what} requested but the '{feature}' feature is not enabled")]
    FeatureNotEnabled {
        /// What was requested.
        what: &'static str,
        /// The missing feature.
        feature: &'static str,
    },
}

/// Compression of serialized values.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum Compression {
    /// No compression.
    #[default]
    Disabled,
    /// gzip, levels 0-9.
    Gzip {
        /// Compression level.
        #[serde(default = "default_gzip_level")]
        level: u32,
    },
    /// zstd, levels 1-22.
    Zstd {
        /// Compression level.
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
    /// snappy.
    Snappy,
}

fn default_gzip_level() -> u32 {
    6
}

fn default_zstd_level() -> i32 {
    3
}

impl Compression {
    /// Convert configuration compression format to a compressor.
    pub fn to_compressor(&self) -> Result<Arc<dyn Compressor>, ConfigError> {
        match self {
            Compression::Disabled => Ok(Arc::new(PassthroughCompressor)),
            #[cfg(feature = "gzip")]
            Compression::Gzip { level } => {
                use memstore_backend::GzipCompressor;
                Ok(Arc::new(GzipCompressor::with_level(*level)))
            }
            #[cfg(not(feature = "gzip"))]
            Compression::Gzip { .. } => Err(ConfigError::FeatureNotEnabled {
                what: "gzip compression",
                feature: "gzip",
            }),
            #[cfg(feature = "zstd")]
            Compression::Zstd { level } => {
                use memstore_backend::ZstdCompressor;
                Ok(Arc::new(ZstdCompressor::with_level(*level)))
            }
            #[cfg(not(feature = "zstd"))]
            Compression::Zstd { .. } => Err(ConfigError::FeatureNotEnabled {
                what: "zstd compression",
                feature: "zstd",
            }),
            #[cfg(feature = "snappy")]
            Compression::Snappy => Ok(Arc::new(memstore_backend::SnappyCompressor)),
            #[cfg(not(feature = "snappy"))]
            Compression::Snappy => Err(ConfigError::FeatureNotEnabled {
                what: "snappy compression",
                feature: "snappy",
            }),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Namespace prepended to every key.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Default logical lifetime of entries (e.g. "5m").
    #[serde(default, with = "humantime_serde")]
    pub expires_in: Option<Duration>,
    /// Default race-condition window for `fetch`.
    #[serde(default, with = "humantime_serde")]
    pub race_condition_ttl: Option<Duration>,
    /// Extra time memcached keeps serialized entries past `expires_in`.
    #[serde(default = "default_race_condition_grace", with = "humantime_serde")]
    pub race_condition_grace: Duration,
    /// Serialized values below this many bytes are not compressed.
    #[serde(default)]
    pub compress_threshold: Option<usize>,
    /// Compression of serialized values.
    #[serde(default)]
    pub compression: Compression,
    /// Compress raw values too. Counters, append/prepend and
    /// `unless_exist` writes are then rejected.
    #[serde(default)]
    pub compress_raw: bool,
    /// Value serialization format.
    #[serde(default)]
    pub format: ValueFormat,
    /// Start in read-only mode.
    #[serde(default)]
    pub read_only: bool,
    /// Swallow transient faults.
    #[serde(default = "default_true")]
    pub swallow_exceptions: bool,
    /// Treat every non-conditional fault as fatal.
    #[serde(default)]
    pub strict: bool,
    /// Largest payload written, in bytes; `null` disables the check.
    #[serde(default = "default_value_size_limit")]
    pub value_size_limit: Option<usize>,
}

fn default_race_condition_grace() -> Duration {
    DEFAULT_RACE_CONDITION_GRACE
}

fn default_true() -> bool {
    true
}

fn default_value_size_limit() -> Option<usize> {
    Some(DEFAULT_VALUE_SIZE_LIMIT)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            expires_in: None,
            race_condition_ttl: None,
            race_condition_grace: DEFAULT_RACE_CONDITION_GRACE,
            compress_threshold: None,
            compression: Compression::Disabled,
            compress_raw: false,
            format: ValueFormat::Json,
            read_only: false,
            swallow_exceptions: true,
            strict: false,
            value_size_limit: Some(DEFAULT_VALUE_SIZE_LIMIT),
        }
    }
}

impl StoreConfig {
    /// A builder for a store on `transport` configured from `self`.
    pub fn into_builder<T>(self, transport: T) -> Result<CacheStoreBuilder<ValueFormat>, ConfigError>
    where
        T: Transport + 'static,
    {
        CacheStore::builder(transport).config(self)
    }
}
