use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{BincodeFormat, Format, FormatError, JsonFormat};

/// A format chosen at runtime, e.g. from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueFormat {
    #[default]
    Json,
    Bincode,
}

impl Format for ValueFormat {
    fn serialize<T>(&self, value: &T) -> Result<Bytes, FormatError>
    where
        T: Serialize + ?Sized,
    {
        match self {
            ValueFormat::Json => JsonFormat.serialize(value),
            ValueFormat::Bincode => BincodeFormat.serialize(value),
        }
    }

    fn deserialize<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        match self {
            ValueFormat::Json => JsonFormat.deserialize(data),
            ValueFormat::Bincode => BincodeFormat.deserialize(data),
        }
    }

    fn deserialize_prefix<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        match self {
            ValueFormat::Json => JsonFormat.deserialize_prefix(data),
            ValueFormat::Bincode => BincodeFormat.deserialize_prefix(data),
        }
    }
}
