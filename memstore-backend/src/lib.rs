//! Transport trait and value codec for memstore.
//!
//! If you want to plug memstore into your own memcached client, implement
//! [`Transport`] for it. The store hands the transport normalized
//! [`WireKey`](memstore_core::WireKey)s and [`Payload`]s produced by the
//! [`Codec`].
//!
//! ## Feature Flags
//!
//! - `gzip` (default) - [`GzipCompressor`] via flate2
//! - `zstd` - `ZstdCompressor`
//! - `snappy` - `SnappyCompressor` via snap
pub mod codec;
pub mod compressor;
mod error;
pub mod format;
mod transport;

pub use codec::{Codec, CodecError, Decoded, Flags, Payload, raw_string_form};
#[cfg(feature = "gzip")]
pub use compressor::GzipCompressor;
#[cfg(feature = "snappy")]
pub use compressor::SnappyCompressor;
#[cfg(feature = "zstd")]
pub use compressor::ZstdCompressor;
pub use compressor::{CompressionError, Compressor, PassthroughCompressor};
pub use error::{FaultKind, TransportError};
pub use format::{BincodeFormat, Format, FormatError, JsonFormat, ValueFormat};
pub use transport::{CasToken, Stats, Transport, TransportResult, Versioned};
