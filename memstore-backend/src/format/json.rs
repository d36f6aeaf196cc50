use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use super::{Format, FormatError};

/// JSON format (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn serialize<T>(&self, value: &T) -> Result<Bytes, FormatError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| FormatError::Serialize(Box::new(e)))
    }

    fn deserialize<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(data).map_err(|e| FormatError::Deserialize(Box::new(e)))
    }
}
