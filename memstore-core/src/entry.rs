//! Cache entries with expiration metadata.
//!
//! An [`Entry`] wraps a cached value with the time it was created and an
//! optional lifetime. It is built on every write right before encoding and
//! rebuilt on every successful read; it is never mutated in place.
//!
//! ## Logical vs wire expiration
//!
//! An entry is *logically* expired once `now > created_at + expires_in`.
//! The store asks memcached to keep the bytes around a little longer than
//! that (the race-condition grace), so a still-resident but logically expired
//! entry can be served to one caller while another recomputes it. Passing a
//! non-zero `race_condition_ttl` to [`Entry::is_expired`] extends the logical
//! deadline by that window.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use memstore_core::Entry;
//! use std::time::Duration;
//!
//! let created = Utc.with_ymd_and_hms(2008, 4, 24, 0, 0, 0).unwrap();
//! let entry = Entry::new("bar", created, Some(Duration::from_secs(60)));
//!
//! let later = created + chrono::Duration::seconds(61);
//! assert!(entry.is_expired(later, Duration::ZERO));
//! assert!(!entry.is_expired(later, Duration::from_secs(10)));
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached value with creation time and lifetime.
///
/// The metadata is serialized ahead of the value so that [`EntryMeta`] can
/// be read from the front of an encoded entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<T> {
    created_at: DateTime<Utc>,
    #[serde(default)]
    expires_in: Option<Duration>,
    value: T,
}

/// The metadata of an [`Entry`], read without its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    created_at: DateTime<Utc>,
    #[serde(default)]
    expires_in: Option<Duration>,
}

impl EntryMeta {
    /// Metadata of a value that never expires, e.g. a raw payload.
    pub fn permanent() -> Self {
        EntryMeta {
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            expires_in: None,
        }
    }

    /// When the entry was created.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Configured lifetime, `None` if the entry never expires.
    #[inline]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// Absolute logical expiration time.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .filter(|d| !d.is_zero())
            .map(|expires_in| add_duration(self.created_at, expires_in))
    }

    /// Checks logical expiration at `now`, extended by `race_condition_ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, race_condition_ttl: Duration) -> bool {
        match self.expires_at() {
            Some(expires_at) => now > add_duration(expires_at, race_condition_ttl),
            None => false,
        }
    }
}

impl<T> Entry<T> {
    /// Creates an entry.
    ///
    /// A zero `expires_in` is treated as "never expires", matching memcached's
    /// meaning of a zero TTL.
    pub fn new(value: T, created_at: DateTime<Utc>, expires_in: Option<Duration>) -> Self {
        Entry {
            created_at,
            expires_in: expires_in.filter(|d| !d.is_zero()),
            value,
        }
    }

    /// The entry's metadata.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            created_at: self.created_at,
            expires_in: self.expires_in,
        }
    }

    /// Returns a reference to the cached value.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consumes the entry and returns the value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// When the entry was created.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Configured lifetime, `None` if the entry never expires.
    #[inline]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// Absolute logical expiration time.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.meta().expires_at()
    }

    /// Checks logical expiration at `now`, extended by `race_condition_ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, race_condition_ttl: Duration) -> bool {
        self.meta().is_expired(now, race_condition_ttl)
    }

    /// Remaining logical lifetime at `now`.
    ///
    /// `None` for entries without expiration or already expired ones.
    pub fn ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at()
            .and_then(|expires_at| (expires_at - now).to_std().ok())
            .filter(|remaining| !remaining.is_zero())
    }

    /// Returns a copy of the entry expiring at `expires_at`.
    ///
    /// The creation time is kept; a deadline before it yields an entry that
    /// is expired as soon as time moves past its creation.
    pub fn with_expires_at(self, expires_at: DateTime<Utc>) -> Self {
        let expires_in = (expires_at - self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        Entry {
            created_at: self.created_at,
            expires_in: Some(expires_in),
            value: self.value,
        }
    }

    /// Maps the value, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Entry<U> {
        Entry {
            created_at: self.created_at,
            expires_in: self.expires_in,
            value: f(self.value),
        }
    }
}

fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
