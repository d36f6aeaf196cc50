//! Logical cache keys.
//!
//! A [`CacheKey`] is what the application names an entry with. It is built
//! from one or more [`KeyPart`]s and expands to a single string:
//!
//! - parts are joined with `/`
//! - a part with a value renders as `name=value`, a bare part as `name`
//!
//! ```
//! use memstore_core::{CacheKey, KeyPart};
//!
//! let key = CacheKey::from("users");
//! assert_eq!(key.to_string(), "users");
//!
//! let key = CacheKey::from_parts(vec![
//!     KeyPart::new("users", None::<&str>),
//!     KeyPart::new("id", Some("42")),
//! ]);
//! assert_eq!(key.to_string(), "users/id=42");
//! ```
//!
//! The expanded string is not yet safe to send to memcached; see
//! [`KeyNormalizer`](crate::KeyNormalizer) for the wire form.
//!
//! [`CacheKey`] uses `Arc` internally, so cloning a key is a reference count
//! increment.

use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A single segment of a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl KeyPart {
    /// Creates a key part, optionally carrying a value.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the part name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the part value, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => f.write_str(&self.key),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct CacheKeyInner {
    parts: Vec<KeyPart>,
}

/// The logical key of a cache entry.
///
/// # Example
///
/// ```
/// use memstore_core::CacheKey;
///
/// let key = CacheKey::from_pairs([("page", "2"), ("locale", "en")]);
/// // Pairs are ordered by name so equal maps expand to equal keys.
/// assert_eq!(key.to_string(), "locale=en/page=2");
/// ```
#[derive(Clone, Debug)]
pub struct CacheKey {
    inner: Arc<CacheKeyInner>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl CacheKey {
    /// Creates a single-segment key.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self::from_parts(vec![KeyPart::new(key, None::<&str>)])
    }

    /// Creates a key from ordered parts.
    pub fn from_parts(parts: Vec<KeyPart>) -> Self {
        CacheKey {
            inner: Arc::new(CacheKeyInner { parts }),
        }
    }

    /// Creates a key from name/value pairs, sorted by name.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut parts: Vec<KeyPart> = pairs
            .into_iter()
            .map(|(key, value)| KeyPart::new(key, Some(value)))
            .collect();
        parts.sort_by(|a, b| a.key.cmp(&b.key));
        Self::from_parts(parts)
    }

    /// Returns an iterator over the key parts.
    pub fn parts(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.parts.iter()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.inner.parts.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey::new(key)
    }
}

impl From<&String> for CacheKey {
    fn from(key: &String) -> Self {
        CacheKey::new(key)
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(key: &CacheKey) -> Self {
        key.clone()
    }
}

impl From<KeyPart> for CacheKey {
    fn from(part: KeyPart) -> Self {
        CacheKey::from_parts(vec![part])
    }
}

impl From<Vec<KeyPart>> for CacheKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        CacheKey::from_parts(parts)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CacheKey {
                fn from(key: $ty) -> Self {
                    CacheKey::new(key.to_string())
                }
            }
        )*
    };
}

impl_from_integer!(u32, u64, i32, i64, usize);
