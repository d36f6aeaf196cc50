use memstore_backend::{CodecError, FaultKind, TransportError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::instrument::Operation;

/// Errors surfaced by [`CacheStore`](crate::CacheStore) operations.
///
/// Transient transport faults only show up here when swallowing is off;
/// fatal ones always do.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A value could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The store configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation cannot work on compressed raw values.
    #[error("{} is not supported when raw values are compressed", .operation.as_str())]
    Unsupported {
        /// The rejected operation.
        operation: Operation,
    },
}

impl CacheError {
    /// Fault kind of a transport error.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            CacheError::Transport(error) => Some(error.kind()),
            _ => None,
        }
    }
}

/// Result type for cache store operations.
pub type CacheResult<T> = Result<T, CacheError>;
