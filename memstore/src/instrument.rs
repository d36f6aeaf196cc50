//! Instrumentation events.
//!
//! The store emits exactly one [`CacheEvent`] per logical call to the
//! [`Instrument`] configured on it. Read-only short-circuits (a suppressed
//! write, delete, append, ...) emit nothing. `fetch` emits a single event
//! even though it may read, refresh and write internally.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use memstore_backend::FaultKind;
use memstore_core::{CacheKey, TransportLabel};

/// Public store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operation {
    Read,
    ReadMulti,
    Write,
    Delete,
    Exist,
    Fetch,
    Increment,
    Decrement,
    Append,
    Prepend,
    Cas,
    CasMulti,
    Clear,
    Stats,
    Reset,
}

impl Operation {
    /// Operation name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::ReadMulti => "read_multi",
            Operation::Write => "write",
            Operation::Delete => "delete",
            Operation::Exist => "exist",
            Operation::Fetch => "fetch",
            Operation::Increment => "increment",
            Operation::Decrement => "decrement",
            Operation::Append => "append",
            Operation::Prepend => "prepend",
            Operation::Cas => "cas",
            Operation::CasMulti => "cas_multi",
            Operation::Clear => "clear",
            Operation::Stats => "stats",
            Operation::Reset => "reset",
        }
    }
}

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// A live value was found.
    Hit,
    /// Nothing usable was found.
    Miss,
    /// A value was written.
    Stored,
    /// The transport declined the write.
    NotStored,
    /// A CAS token was stale.
    Conflict,
    /// The operation completed and has no hit/miss meaning.
    Done,
    /// The call failed. Carries the fault kind for transport faults, `None`
    /// for encoding failures.
    Error(Option<FaultKind>),
}

impl Outcome {
    /// Outcome name used in metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::Stored => "stored",
            Outcome::NotStored => "not_stored",
            Outcome::Conflict => "conflict",
            Outcome::Done => "done",
            Outcome::Error(_) => "error",
        }
    }

    /// Returns `true` for [`Outcome::Error`].
    pub fn is_error(self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

/// One logical store call.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    /// The public operation.
    pub operation: Operation,
    /// Logical keys the call named, in call order.
    pub keys: Vec<CacheKey>,
    /// How the call ended.
    pub outcome: Outcome,
    /// Number of keys that produced a live value.
    pub hits: usize,
    /// Wall time spent in the call.
    pub elapsed: Duration,
    /// Label of the transport the store talks to.
    pub transport: TransportLabel,
}

/// Receives store events.
pub trait Instrument: Debug + Send + Sync {
    /// Called once per logical store call.
    fn record(&self, event: &CacheEvent);
}

impl<I: Instrument + ?Sized> Instrument for Arc<I> {
    fn record(&self, event: &CacheEvent) {
        (**self).record(event)
    }
}

/// An [`Instrument`] that keeps every event in memory.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<CacheEvent>>>,
}

impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Operations of the recorded events, oldest first.
    pub fn operations(&self) -> Vec<Operation> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.operation)
            .collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Instrument for EventLog {
    fn record(&self, event: &CacheEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
