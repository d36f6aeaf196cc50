//! Wire key normalization.
//!
//! memcached keys must not contain whitespace or control characters and
//! must not exceed 250 bytes. [`KeyNormalizer`] turns a [`CacheKey`] plus an
//! optional namespace into a [`WireKey`] that satisfies both rules:
//!
//! 1. the key is expanded and prefixed as `{namespace}:{key}`,
//! 2. every byte in `0x00..=0x20`, `%` and `0x7F..=0xFF` is written as `%XX`
//!    with two uppercase hex digits (multi-byte UTF-8 escapes byte by byte),
//! 3. a result longer than 250 bytes keeps its first 213 bytes followed by
//!    `:md5:` and the hex MD5 digest of the full escaped key.
//!
//! ```
//! use memstore_core::{CacheKey, KeyNormalizer};
//!
//! let wire = KeyNormalizer::normalize(&CacheKey::from("hello world"), Some("app"));
//! assert_eq!(wire.as_str(), "app:hello%20world");
//! ```

use std::borrow::Borrow;
use std::fmt::{self, Write as _};

use crate::CacheKey;

/// Maximum key length accepted by memcached.
pub const MAX_KEY_LENGTH: usize = 250;

/// Length of the escaped prefix kept when a key is hashed.
pub const TRUNCATED_KEY_LENGTH: usize = 213;

const DIGEST_MARKER: &str = ":md5:";

/// A transport-safe key.
///
/// Always printable ASCII and at most [`MAX_KEY_LENGTH`] bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireKey(String);

impl WireKey {
    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Key length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the empty key.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the key was truncated and suffixed with a digest.
    pub fn is_hashed(&self) -> bool {
        self.0.len() == TRUNCATED_KEY_LENGTH + DIGEST_MARKER.len() + 32
            && self.0[TRUNCATED_KEY_LENGTH..].starts_with(DIGEST_MARKER)
    }

    /// Consumes the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WireKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WireKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for WireKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Builds [`WireKey`]s from logical keys.
///
/// Normalization is a pure function of the key and the namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyNormalizer;

impl KeyNormalizer {
    /// Normalizes `key` under `namespace`.
    pub fn normalize(key: &CacheKey, namespace: Option<&str>) -> WireKey {
        let expanded = key.to_string();
        let namespaced = match namespace {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}:{expanded}"),
            _ => expanded,
        };

        let escaped = escape(namespaced.as_bytes());
        if escaped.len() <= MAX_KEY_LENGTH {
            return WireKey(escaped);
        }

        // Escaped keys are ASCII, any byte offset is a char boundary.
        let digest = md5::compute(escaped.as_bytes());
        WireKey(format!(
            "{}{DIGEST_MARKER}{:x}",
            &escaped[..TRUNCATED_KEY_LENGTH],
            digest
        ))
    }
}

#[inline]
fn needs_escape(byte: u8) -> bool {
    byte <= 0x20 || byte == b'%' || byte >= 0x7F
}

/// Percent-escapes control, space, `%` and high-bit bytes.
pub fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if needs_escape(byte) {
            // Writing to a String cannot fail.
            let _ = write!(out, "%{byte:02X}");
        } else {
            out.push(char::from(byte));
        }
    }
    out
}
