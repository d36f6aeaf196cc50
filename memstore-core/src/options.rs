//! Per-call options.
//!
//! Every store operation takes an [`Options`] value. Unset fields fall back to
//! the store-wide defaults through [`Options::merge`].
//!
//! ```
//! use memstore_core::Options;
//! use std::time::Duration;
//!
//! let defaults = Options::new().expires_in(Duration::from_secs(60)).namespace("app");
//! let call = Options::new().raw().merge(&defaults);
//!
//! assert!(call.raw);
//! assert_eq!(call.expires_in, Some(Duration::from_secs(60)));
//! assert_eq!(call.namespace.as_deref(), Some("app"));
//! ```

use smol_str::SmolStr;
use std::time::Duration;

/// Options for a single cache operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Store the value's string form instead of a serialized entry.
    pub raw: bool,
    /// Override whether serialized payloads are compressed.
    pub compress: Option<bool>,
    /// Minimum serialized size, in bytes, before compression kicks in.
    pub compress_threshold: Option<usize>,
    /// Logical lifetime of written entries.
    pub expires_in: Option<Duration>,
    /// Grace window during which an expired entry may still be served while
    /// it is being recomputed.
    pub race_condition_ttl: Option<Duration>,
    /// Only write if the key is absent.
    pub unless_exist: bool,
    /// Namespace prepended to every key.
    pub namespace: Option<SmolStr>,
    /// Make `fetch` skip the read and recompute.
    pub force: bool,
}

impl Options {
    /// Empty options; every field falls back to store defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass serialization.
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    /// Enable or disable compression for this call.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    /// Set the compression threshold in bytes.
    pub fn compress_threshold(mut self, threshold: usize) -> Self {
        self.compress_threshold = Some(threshold);
        self
    }

    /// Set the logical lifetime.
    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Set the race-condition grace window.
    pub fn race_condition_ttl(mut self, ttl: Duration) -> Self {
        self.race_condition_ttl = Some(ttl);
        self
    }

    /// Write only if the key does not exist yet.
    pub fn unless_exist(mut self) -> Self {
        self.unless_exist = true;
        self
    }

    /// Set the namespace.
    pub fn namespace(mut self, namespace: impl Into<SmolStr>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Force `fetch` to recompute.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Race-condition window, zero when unset.
    pub fn race_condition_window(&self) -> Duration {
        self.race_condition_ttl.unwrap_or(Duration::ZERO)
    }

    /// Fills unset fields from `defaults`.
    pub fn merge(&self, defaults: &Options) -> Options {
        Options {
            raw: self.raw || defaults.raw,
            compress: self.compress.or(defaults.compress),
            compress_threshold: self.compress_threshold.or(defaults.compress_threshold),
            expires_in: self.expires_in.or(defaults.expires_in),
            race_condition_ttl: self.race_condition_ttl.or(defaults.race_condition_ttl),
            unless_exist: self.unless_exist || defaults.unless_exist,
            namespace: self.namespace.clone().or_else(|| defaults.namespace.clone()),
            force: self.force || defaults.force,
        }
    }
}
