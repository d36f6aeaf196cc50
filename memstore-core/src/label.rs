//! Transport label type.
//!
//! `TransportLabel` names a transport in log records, instrumentation events
//! and metrics, e.g. `"memory"` or `"memcached:cluster-a"`.

use smol_str::SmolStr;
use std::fmt;

/// A label identifying a transport.
///
/// # Example
/// ```
/// use memstore_core::TransportLabel;
///
/// let label = TransportLabel::new_static("memory");
/// assert_eq!(label.as_str(), "memory");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TransportLabel(SmolStr);

impl TransportLabel {
    /// Creates a new transport label.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Creates a label from a static string (no allocation).
    #[inline]
    pub const fn new_static(s: &'static str) -> Self {
        Self(SmolStr::new_static(s))
    }

    /// Returns the label as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TransportLabel {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for TransportLabel {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl AsRef<str> for TransportLabel {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}
