//! Value codec.
//!
//! Turns values into `(bytes, flags)` payloads and back. Three payload modes
//! are distinguished by [`Flags`]:
//!
//! - `SERIALIZED`: an [`Entry`] written with the configured [`Format`],
//!   optionally `COMPRESSED` on top,
//! - `RAW`: the value's string form, used for counters and append/prepend
//!   targets. Only compressed when the codec is set to compress raw values,
//!   which makes them unusable as counters,
//! - no flags at all: payloads written by older clients. They are decoded
//!   heuristically and never produced by this codec.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use memstore_core::{Entry, EntryMeta, Options};
use serde::de::value::{BytesDeserializer, Error as ValueError, StrDeserializer};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::compressor::{CompressionError, Compressor, PassthroughCompressor};
use crate::format::{Format, FormatError, JsonFormat};

/// Payload flag bits, compatible with common memcached clients.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const SERIALIZED: Flags = Flags(1 << 0);
    pub const COMPRESSED: Flags = Flags(1 << 1);
    pub const RAW: Flags = Flags(1 << 4);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Flags(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Flags::SERIALIZED) {
            names.push("SERIALIZED");
        }
        if self.contains(Flags::COMPRESSED) {
            names.push("COMPRESSED");
        }
        if self.contains(Flags::RAW) {
            names.push("RAW");
        }
        write!(f, "Flags({:#x}", self.0)?;
        if !names.is_empty() {
            write!(f, ": {}", names.join(" | "))?;
        }
        f.write_str(")")
    }
}

/// Bytes as stored by the transport, with their flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub data: Bytes,
    pub flags: Flags,
}

impl Payload {
    pub fn new(data: impl Into<Bytes>, flags: Flags) -> Self {
        Payload {
            data: data.into(),
            flags,
        }
    }

    /// A `RAW` payload.
    pub fn raw(data: impl Into<Bytes>) -> Self {
        Payload::new(data, Flags::RAW)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error("raw payload cannot be read as the requested type")]
    RawConversion,
}

/// Result of decoding a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// A serialized entry.
    Entry(Entry<T>),
    /// Raw bytes.
    Raw(Bytes),
}

impl<T: DeserializeOwned> Decoded<T> {
    /// Converts to an entry.
    ///
    /// Raw bytes carry no metadata and never expire. They are read as a
    /// string first, then as JSON text (numbers, compound values written
    /// raw), then as bytes.
    pub fn into_entry(self) -> Result<Entry<T>, CodecError> {
        match self {
            Decoded::Entry(entry) => Ok(entry),
            Decoded::Raw(bytes) => raw_to_value(&bytes)
                .map(|value| Entry::new(value, DateTime::<Utc>::UNIX_EPOCH, None)),
        }
    }
}

fn raw_to_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if let Ok(value) = T::deserialize(StrDeserializer::<ValueError>::new(text)) {
            return Ok(value);
        }
        if let Ok(value) = serde_json::from_str(text) {
            return Ok(value);
        }
    }
    T::deserialize(BytesDeserializer::<ValueError>::new(bytes))
        .map_err(|_| CodecError::RawConversion)
}

/// String form of a value for raw storage.
///
/// Strings are stored verbatim, numbers and booleans as their decimal or
/// `true`/`false` text, nil as the empty string and anything else as JSON.
pub fn raw_string_form<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let value = serde_json::to_value(value).map_err(|e| FormatError::Serialize(Box::new(e)))?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

/// Encodes and decodes payloads.
#[derive(Debug, Clone)]
pub struct Codec<F: Format = JsonFormat> {
    format: F,
    compressor: Arc<dyn Compressor>,
    compress_threshold: Option<usize>,
    compress_raw: bool,
}

impl Default for Codec<JsonFormat> {
    fn default() -> Self {
        Codec::new(JsonFormat)
    }
}

impl<F: Format> Codec<F> {
    /// A codec with the given format and no compression.
    pub fn new(format: F) -> Self {
        Codec {
            format,
            compressor: Arc::new(PassthroughCompressor),
            compress_threshold: None,
            compress_raw: false,
        }
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    /// Payloads smaller than `threshold` bytes are not compressed.
    pub fn with_compress_threshold(mut self, threshold: Option<usize>) -> Self {
        self.compress_threshold = threshold;
        self
    }

    /// Compress `RAW` payloads too, whatever their size.
    pub fn with_compress_raw(mut self, compress_raw: bool) -> Self {
        self.compress_raw = compress_raw;
        self
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn compressor(&self) -> &dyn Compressor {
        self.compressor.as_ref()
    }

    pub fn compress_threshold(&self) -> Option<usize> {
        self.compress_threshold
    }

    /// Whether `RAW` payloads are compressed.
    pub fn compress_raw(&self) -> bool {
        self.compress_raw && self.compressor.is_enabled()
    }

    /// Encodes an entry as a `SERIALIZED` payload, compressed when enabled.
    pub fn encode_entry<T>(&self, entry: &Entry<T>, options: &Options) -> Result<Payload, CodecError>
    where
        T: Serialize,
    {
        let serialized = self.format.serialize(entry)?;
        if !self.should_compress(serialized.len(), options) {
            return Ok(Payload::new(serialized, Flags::SERIALIZED));
        }
        let compressed = self.compressor.compress(&serialized)?;
        Ok(Payload::new(compressed, Flags::SERIALIZED | Flags::COMPRESSED))
    }

    /// Encodes the string form of a value as a `RAW` payload.
    pub fn encode_raw<T>(&self, value: &T) -> Result<Payload, CodecError>
    where
        T: Serialize + ?Sized,
    {
        let text = raw_string_form(value)?;
        if !self.compress_raw() {
            return Ok(Payload::raw(text));
        }
        let compressed = self.compressor.compress(text.as_bytes())?;
        Ok(Payload::new(compressed, Flags::RAW | Flags::COMPRESSED))
    }

    /// Decodes a payload.
    ///
    /// `COMPRESSED` data is decompressed first, whatever the other flags.
    pub fn decode<T>(&self, payload: &Payload) -> Result<Decoded<T>, CodecError>
    where
        T: DeserializeOwned,
    {
        let flags = payload.flags;
        if flags.is_empty() {
            return Ok(self.decode_legacy(&payload.data));
        }
        let data = self.decompressed(payload)?;

        if flags.contains(Flags::SERIALIZED) && !flags.contains(Flags::RAW) {
            Ok(Decoded::Entry(self.format.deserialize::<Entry<T>>(&data)?))
        } else {
            Ok(Decoded::Raw(data))
        }
    }

    /// Reads the creation time and lifetime of a payload without its value.
    ///
    /// Raw payloads never expire. Legacy payloads that do not hold an entry
    /// are treated the same way.
    pub fn decode_meta(&self, payload: &Payload) -> Result<EntryMeta, CodecError> {
        let flags = payload.flags;
        if flags.is_empty() {
            return Ok(self
                .format
                .deserialize_prefix::<EntryMeta>(&payload.data)
                .unwrap_or_else(|_| EntryMeta::permanent()));
        }
        let data = self.decompressed(payload)?;

        if flags.contains(Flags::SERIALIZED) && !flags.contains(Flags::RAW) {
            Ok(self.format.deserialize_prefix::<EntryMeta>(&data)?)
        } else {
            Ok(EntryMeta::permanent())
        }
    }

    fn decompressed(&self, payload: &Payload) -> Result<Bytes, CodecError> {
        if payload.flags.contains(Flags::COMPRESSED) {
            Ok(Bytes::from(self.compressor.decompress(&payload.data)?))
        } else {
            Ok(payload.data.clone())
        }
    }

    /// Decodes a payload and converts it to an entry.
    pub fn decode_entry<T>(&self, payload: &Payload) -> Result<Entry<T>, CodecError>
    where
        T: DeserializeOwned,
    {
        self.decode(payload)?.into_entry()
    }

    fn decode_legacy<T>(&self, data: &Bytes) -> Decoded<T>
    where
        T: DeserializeOwned,
    {
        if let Ok(entry) = self.format.deserialize::<Entry<T>>(data) {
            return Decoded::Entry(entry);
        }
        if let Ok(value) = self.format.deserialize::<T>(data) {
            return Decoded::Entry(Entry::new(value, DateTime::<Utc>::UNIX_EPOCH, None));
        }
        Decoded::Raw(data.clone())
    }

    fn should_compress(&self, len: usize, options: &Options) -> bool {
        if !self.compressor.is_enabled() || options.compress == Some(false) {
            return false;
        }
        match options.compress_threshold.or(self.compress_threshold) {
            Some(threshold) => len >= threshold,
            None => true,
        }
    }
}
