//! Payload compression.
//!
//! | Compressor | Feature |
//! |------------|---------|
//! | [`PassthroughCompressor`] | always |
//! | `GzipCompressor` | `gzip` (default) |
//! | `ZstdCompressor` | `zstd` |
//! | `SnappyCompressor` | `snappy` |

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
}

/// Compresses serialized payloads.
pub trait Compressor: std::fmt::Debug + Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;

    /// Returns `false` for compressors that leave data untouched; the codec
    /// never sets the `COMPRESSED` flag for them.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Clone this compressor into a box (for object safety)
    fn clone_box(&self) -> Box<dyn Compressor>;
}

impl Clone for Box<dyn Compressor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// No compression.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompressor;

impl Compressor for PassthroughCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(data.to_vec())
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn clone_box(&self) -> Box<dyn Compressor> {
        Box::new(*self)
    }
}

#[cfg(feature = "gzip")]
pub use gzip::GzipCompressor;

#[cfg(feature = "gzip")]
mod gzip {
    use super::{CompressionError, Compressor};
    use flate2::{Compression, read::GzDecoder, write::GzEncoder};
    use std::io::{Read, Write};

    /// Gzip compression through flate2.
    #[derive(Debug, Clone, Copy)]
    pub struct GzipCompressor {
        level: u32,
    }

    impl GzipCompressor {
        /// Compression level 0-9; values above 9 are clamped.
        pub fn with_level(level: u32) -> Self {
            Self {
                level: level.min(9),
            }
        }

        pub fn level(&self) -> u32 {
            self.level
        }
    }

    impl Default for GzipCompressor {
        fn default() -> Self {
            Self::with_level(6)
        }
    }

    impl Compressor for GzipCompressor {
        fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
            encoder.write_all(data).map_err(CompressionError::Compress)?;
            encoder.finish().map_err(CompressionError::Compress)
        }

        fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(CompressionError::Decompress)?;
            Ok(out)
        }

        fn name(&self) -> &'static str {
            "gzip"
        }

        fn clone_box(&self) -> Box<dyn Compressor> {
            Box::new(*self)
        }
    }
}

#[cfg(feature = "zstd")]
pub use self::zstd::ZstdCompressor;

#[cfg(feature = "zstd")]
mod zstd {
    use super::{CompressionError, Compressor};

    /// Zstandard compression.
    #[derive(Debug, Clone, Copy)]
    pub struct ZstdCompressor {
        level: i32,
    }

    impl ZstdCompressor {
        pub fn with_level(level: i32) -> Self {
            Self { level }
        }

        pub fn level(&self) -> i32 {
            self.level
        }
    }

    impl Default for ZstdCompressor {
        fn default() -> Self {
            Self::with_level(3)
        }
    }

    impl Compressor for ZstdCompressor {
        fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            ::zstd::encode_all(data, self.level).map_err(CompressionError::Compress)
        }

        fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            ::zstd::decode_all(data).map_err(CompressionError::Decompress)
        }

        fn name(&self) -> &'static str {
            "zstd"
        }

        fn clone_box(&self) -> Box<dyn Compressor> {
            Box::new(*self)
        }
    }
}

#[cfg(feature = "snappy")]
pub use snappy::SnappyCompressor;

#[cfg(feature = "snappy")]
mod snappy {
    use super::{CompressionError, Compressor};
    use snap::raw::{Decoder, Encoder};

    /// Snappy raw-format compression.
    ///
    /// Fast, with no level to tune.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SnappyCompressor;

    impl Compressor for SnappyCompressor {
        fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            Encoder::new()
                .compress_vec(data)
                .map_err(|e| CompressionError::Compress(e.into()))
        }

        fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            Decoder::new()
                .decompress_vec(data)
                .map_err(|e| CompressionError::Decompress(e.into()))
        }

        fn name(&self) -> &'static str {
            "snappy"
        }

        fn clone_box(&self) -> Box<dyn Compressor> {
            Box::new(*self)
        }
    }
}
