//! Error types for transport operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned by a [`Transport`](crate::Transport).
///
/// Variants mirror the failure modes of memcached clients so the store can
/// classify them: conditional outcomes (`NotFound`, `NotStored`, `Exists`),
/// misconfiguration that should always surface, and transient runtime faults.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The key does not exist.
    #[error("key not found")]
    NotFound,

    /// A conditional write (`add`, `append`, `prepend`) was not performed.
    #[error("item not stored")]
    NotStored,

    /// CAS token mismatch: the item changed since it was read.
    #[error("item exists with a different cas token")]
    Exists,

    /// The key contains characters the server rejects.
    #[error("bad key: {0}")]
    BadKey(String),

    /// The key is empty.
    #[error("zero-length key")]
    ZeroLengthKey,

    /// Binding the client socket failed.
    #[error("connection bind failure")]
    ConnectionBindFailure,

    /// The connection has no data to read.
    #[error("connection data does not exist")]
    ConnectionDataDoesNotExist,

    /// Connecting to the server failed.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// Creating the client socket failed.
    #[error("socket create failure")]
    SocketCreateFailure,

    /// Opening a unix socket failed.
    #[error("could not open unix socket: {0}")]
    UnixSocketOpenFailure(String),

    /// The client has no servers configured.
    #[error("no servers defined")]
    NoServersDefined,

    /// Client and server disagree on the protocol.
    #[error("protocol mismatch")]
    ProtocolMismatch,

    /// The server was marked dead after repeated failures.
    #[error("server is marked dead")]
    ServerMarkedDead,

    /// The connection was reset mid-request.
    #[error("connection reset")]
    ConnectionReset,

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The server rejected the request as malformed.
    #[error("client error: {0}")]
    ClientError(String),

    /// The server failed to process the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// Socket-level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other failure.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> FaultKind {
        match self {
            TransportError::NotFound => FaultKind::NotFound,
            TransportError::NotStored => FaultKind::NotStored,
            TransportError::Exists => FaultKind::Exists,
            TransportError::BadKey(_) => FaultKind::BadKey,
            TransportError::ZeroLengthKey => FaultKind::ZeroLengthKey,
            TransportError::ConnectionBindFailure => FaultKind::ConnectionBindFailure,
            TransportError::ConnectionDataDoesNotExist => FaultKind::ConnectionDataDoesNotExist,
            TransportError::ConnectionFailure(_) => FaultKind::ConnectionFailure,
            TransportError::SocketCreateFailure => FaultKind::SocketCreateFailure,
            TransportError::UnixSocketOpenFailure(_) => FaultKind::UnixSocketOpenFailure,
            TransportError::NoServersDefined => FaultKind::NoServersDefined,
            TransportError::ProtocolMismatch => FaultKind::ProtocolMismatch,
            TransportError::ServerMarkedDead => FaultKind::ServerMarkedDead,
            TransportError::ConnectionReset => FaultKind::ConnectionReset,
            TransportError::Timeout => FaultKind::Timeout,
            TransportError::ClientError(_) => FaultKind::ClientError,
            TransportError::ServerError(_) => FaultKind::ServerError,
            TransportError::Io(_) => FaultKind::Io,
            TransportError::Other(_) => FaultKind::Other,
        }
    }

    /// Builds an error for a kind, with a generic message where one is needed.
    ///
    /// Used by test transports to inject faults.
    pub fn from_kind(kind: FaultKind) -> Self {
        match kind {
            FaultKind::NotFound => TransportError::NotFound,
            FaultKind::NotStored => TransportError::NotStored,
            FaultKind::Exists => TransportError::Exists,
            FaultKind::BadKey => TransportError::BadKey("injected".to_owned()),
            FaultKind::ZeroLengthKey => TransportError::ZeroLengthKey,
            FaultKind::ConnectionBindFailure => TransportError::ConnectionBindFailure,
            FaultKind::ConnectionDataDoesNotExist => TransportError::ConnectionDataDoesNotExist,
            FaultKind::ConnectionFailure => TransportError::ConnectionFailure("injected".to_owned()),
            FaultKind::SocketCreateFailure => TransportError::SocketCreateFailure,
            FaultKind::UnixSocketOpenFailure => {
                TransportError::UnixSocketOpenFailure("injected".to_owned())
            }
            FaultKind::NoServersDefined => TransportError::NoServersDefined,
            FaultKind::ProtocolMismatch => TransportError::ProtocolMismatch,
            FaultKind::ServerMarkedDead => TransportError::ServerMarkedDead,
            FaultKind::ConnectionReset => TransportError::ConnectionReset,
            FaultKind::Timeout => TransportError::Timeout,
            FaultKind::ClientError => TransportError::ClientError("injected".to_owned()),
            FaultKind::ServerError => TransportError::ServerError("injected".to_owned()),
            FaultKind::Io => TransportError::Io(std::io::Error::other("injected")),
            FaultKind::Other => TransportError::Other("injected".into()),
        }
    }
}

/// Discriminant of a [`TransportError`].
///
/// Fault classification tables are expressed in kinds, so they can be
/// built from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    NotFound,
    NotStored,
    Exists,
    BadKey,
    ZeroLengthKey,
    ConnectionBindFailure,
    ConnectionDataDoesNotExist,
    ConnectionFailure,
    SocketCreateFailure,
    UnixSocketOpenFailure,
    NoServersDefined,
    ProtocolMismatch,
    ServerMarkedDead,
    ConnectionReset,
    Timeout,
    ClientError,
    ServerError,
    Io,
    Other,
}

impl FaultKind {
    /// Every kind, in declaration order.
    pub const ALL: [FaultKind; 19] = [
        FaultKind::NotFound,
        FaultKind::NotStored,
        FaultKind::Exists,
        FaultKind::BadKey,
        FaultKind::ZeroLengthKey,
        FaultKind::ConnectionBindFailure,
        FaultKind::ConnectionDataDoesNotExist,
        FaultKind::ConnectionFailure,
        FaultKind::SocketCreateFailure,
        FaultKind::UnixSocketOpenFailure,
        FaultKind::NoServersDefined,
        FaultKind::ProtocolMismatch,
        FaultKind::ServerMarkedDead,
        FaultKind::ConnectionReset,
        FaultKind::Timeout,
        FaultKind::ClientError,
        FaultKind::ServerError,
        FaultKind::Io,
        FaultKind::Other,
    ];

    /// Returns `true` for outcomes of conditional operations rather than
    /// failures: `NotFound`, `NotStored` and `Exists`.
    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            FaultKind::NotFound | FaultKind::NotStored | FaultKind::Exists
        )
    }

    /// Snake-case name, as used in configuration and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::NotFound => "not_found",
            FaultKind::NotStored => "not_stored",
            FaultKind::Exists => "exists",
            FaultKind::BadKey => "bad_key",
            FaultKind::ZeroLengthKey => "zero_length_key",
            FaultKind::ConnectionBindFailure => "connection_bind_failure",
            FaultKind::ConnectionDataDoesNotExist => "connection_data_does_not_exist",
            FaultKind::ConnectionFailure => "connection_failure",
            FaultKind::SocketCreateFailure => "socket_create_failure",
            FaultKind::UnixSocketOpenFailure => "unix_socket_open_failure",
            FaultKind::NoServersDefined => "no_servers_defined",
            FaultKind::ProtocolMismatch => "protocol_mismatch",
            FaultKind::ServerMarkedDead => "server_marked_dead",
            FaultKind::ConnectionReset => "connection_reset",
            FaultKind::Timeout => "timeout",
            FaultKind::ClientError => "client_error",
            FaultKind::ServerError => "server_error",
            FaultKind::Io => "io",
            FaultKind::Other => "other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
