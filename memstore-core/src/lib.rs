#![warn(missing_docs)]
//! # memstore-core
//!
//! Core types shared by the memstore crates.
//!
//! - [`CacheKey`] - the logical key an application names an entry with
//! - [`KeyNormalizer`] / [`WireKey`] - the memcached-safe form of a key
//! - [`Entry`] - a cached value with creation time and lifetime
//! - [`Options`] - per-call behavior (raw, compression, expiration, ...)
//! - [`Clock`] - time source used for expiration decisions
//!
//! ## Feature Flags
//!
//! - `test-helpers` - Expose `ManualClock` for deterministic time in tests

pub mod clock;
pub mod entry;
pub mod key;
pub mod label;
pub mod normalize;
pub mod options;

#[cfg(any(test, feature = "test-helpers"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use entry::{Entry, EntryMeta};
pub use key::{CacheKey, KeyPart};
pub use label::TransportLabel;
pub use normalize::{KeyNormalizer, MAX_KEY_LENGTH, TRUNCATED_KEY_LENGTH, WireKey};
pub use options::Options;
#[doc(hidden)]
pub use smol_str::SmolStr;
