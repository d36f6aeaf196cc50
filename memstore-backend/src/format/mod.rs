//! Value serialization formats.
//!
//! A [`Format`] turns a serde value into bytes and back. The codec uses it
//! for the `SERIALIZED` payload mode; raw payloads bypass it.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

mod bincode;
mod json;
mod value;

pub use bincode::BincodeFormat;
pub use json::JsonFormat;
pub use value::ValueFormat;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// A serde-based serialization format.
pub trait Format: std::fmt::Debug + Clone + Send + Sync + 'static {
    fn serialize<T>(&self, value: &T) -> Result<Bytes, FormatError>
    where
        T: Serialize + ?Sized;

    fn deserialize<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned;

    /// Reads a value from the start of `data`, ignoring whatever follows.
    ///
    /// Used to read entry metadata without the value. Self-describing
    /// formats skip unknown fields anyway, so the default just deserializes.
    fn deserialize_prefix<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        self.deserialize(data)
    }
}
