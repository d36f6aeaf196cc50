//! Sorting transport faults.
//!
//! A [`FaultClassifier`] decides, for every [`TransportError`], whether it is
//! a conditional outcome of the operation or a real fault, and whether a
//! fault may be swallowed. The set of fatal kinds is data owned by the
//! classifier, so it can be tightened for tests ([`FaultClassifier::strict`])
//! or adjusted per deployment.

use std::collections::HashSet;

use memstore_backend::{FaultKind, TransportError};

/// Fault kinds that are never swallowed by default.
///
/// These point at misconfiguration or a programming error rather than a
/// passing network condition.
pub const DEFAULT_FATAL: [FaultKind; 9] = [
    FaultKind::BadKey,
    FaultKind::ZeroLengthKey,
    FaultKind::ConnectionBindFailure,
    FaultKind::ConnectionDataDoesNotExist,
    FaultKind::ConnectionFailure,
    FaultKind::SocketCreateFailure,
    FaultKind::UnixSocketOpenFailure,
    FaultKind::NoServersDefined,
    FaultKind::ProtocolMismatch,
];

/// How the store treats a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// The key is absent. Never logged, never raised.
    Miss,
    /// A CAS token no longer matches.
    Conflict,
    /// The server declined the write (`add` on a present key, append to a
    /// missing one).
    NotStored,
    /// Swallowed when swallowing is enabled.
    Transient,
    /// Always raised.
    Fatal,
}

/// Maps transport errors to [`Fault`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultClassifier {
    fatal: HashSet<FaultKind>,
}

impl Default for FaultClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FATAL)
    }
}

impl FaultClassifier {
    /// A classifier treating `fatal` kinds as fatal.
    ///
    /// Conditional kinds (`NotFound`, `NotStored`, `Exists`) are ignored here;
    /// they are outcomes, not faults.
    pub fn new(fatal: impl IntoIterator<Item = FaultKind>) -> Self {
        FaultClassifier {
            fatal: fatal
                .into_iter()
                .filter(|kind| !kind.is_conditional())
                .collect(),
        }
    }

    /// Every non-conditional fault is fatal. Useful in tests, where a
    /// swallowed fault hides a bug.
    pub fn strict() -> Self {
        Self::new(FaultKind::ALL)
    }

    /// Adds `kind` to the fatal set.
    pub fn with_fatal(mut self, kind: FaultKind) -> Self {
        if !kind.is_conditional() {
            self.fatal.insert(kind);
        }
        self
    }

    /// Removes `kind` from the fatal set.
    pub fn without_fatal(mut self, kind: FaultKind) -> Self {
        self.fatal.remove(&kind);
        self
    }

    /// Returns `true` if `kind` is fatal.
    pub fn is_fatal(&self, kind: FaultKind) -> bool {
        self.fatal.contains(&kind)
    }

    /// Classifies a fault kind.
    pub fn classify_kind(&self, kind: FaultKind) -> Fault {
        match kind {
            FaultKind::NotFound => Fault::Miss,
            FaultKind::Exists => Fault::Conflict,
            FaultKind::NotStored => Fault::NotStored,
            kind if self.is_fatal(kind) => Fault::Fatal,
            _ => Fault::Transient,
        }
    }

    /// Classifies a transport error.
    pub fn classify(&self, error: &TransportError) -> Fault {
        self.classify_kind(error.kind())
    }
}
