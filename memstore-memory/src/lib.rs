#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod transport;

pub use transport::MemoryTransport;

/// Transport operations, used to count calls and inject faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TransportOp {
    Get,
    GetMulti,
    Gets,
    GetsMulti,
    Set,
    Add,
    Cas,
    Delete,
    Incr,
    Decr,
    Append,
    Prepend,
    Flush,
    Stats,
    Reset,
}

impl TransportOp {
    /// Number of operations.
    pub const COUNT: usize = 15;

    /// Every operation.
    pub const ALL: [TransportOp; Self::COUNT] = [
        TransportOp::Get,
        TransportOp::GetMulti,
        TransportOp::Gets,
        TransportOp::GetsMulti,
        TransportOp::Set,
        TransportOp::Add,
        TransportOp::Cas,
        TransportOp::Delete,
        TransportOp::Incr,
        TransportOp::Decr,
        TransportOp::Append,
        TransportOp::Prepend,
        TransportOp::Flush,
        TransportOp::Stats,
        TransportOp::Reset,
    ];

    /// Returns `true` for operations that change stored data.
    pub fn is_write(self) -> bool {
        !matches!(
            self,
            TransportOp::Get
                | TransportOp::GetMulti
                | TransportOp::Gets
                | TransportOp::GetsMulti
                | TransportOp::Stats
                | TransportOp::Reset
        )
    }

    /// Operation name as used by memcached.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportOp::Get => "get",
            TransportOp::GetMulti => "get_multi",
            TransportOp::Gets => "gets",
            TransportOp::GetsMulti => "gets_multi",
            TransportOp::Set => "set",
            TransportOp::Add => "add",
            TransportOp::Cas => "cas",
            TransportOp::Delete => "delete",
            TransportOp::Incr => "incr",
            TransportOp::Decr => "decr",
            TransportOp::Append => "append",
            TransportOp::Prepend => "prepend",
            TransportOp::Flush => "flush",
            TransportOp::Stats => "stats",
            TransportOp::Reset => "reset",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}
