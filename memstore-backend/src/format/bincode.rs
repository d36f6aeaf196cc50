use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use super::{Format, FormatError};

/// Bincode format
///
/// Compact, but not self-describing: values must be read back as the type
/// they were written with.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeFormat;

impl Format for BincodeFormat {
    fn serialize<T>(&self, value: &T) -> Result<Bytes, FormatError>
    where
        T: Serialize + ?Sized,
    {
        ::bincode::serde::encode_to_vec(value, ::bincode::config::standard())
            .map(Bytes::from)
            .map_err(|e| FormatError::Serialize(Box::new(e)))
    }

    fn deserialize<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        let (value, read) = decode(data)?;
        // Trailing bytes mean the payload was written as another type.
        if read != data.len() {
            return Err(FormatError::Deserialize(Box::new(std::io::Error::other(
                "trailing bytes after bincode value",
            ))));
        }
        Ok(value)
    }

    fn deserialize_prefix<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        decode(data).map(|(value, _)| value)
    }
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<(T, usize), FormatError> {
    ::bincode::serde::decode_from_slice::<T, _>(data, ::bincode::config::standard())
        .map_err(|e| FormatError::Deserialize(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_ignores_trailing_bytes() {
        let data = BincodeFormat.serialize(&(7u32, "rest")).unwrap();
        assert!(BincodeFormat.deserialize::<u32>(&data).is_err());
        assert_eq!(BincodeFormat.deserialize_prefix::<u32>(&data).unwrap(), 7);
    }
}
