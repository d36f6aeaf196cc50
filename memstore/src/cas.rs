//! Results of batched compare-and-swap.
//!
//! [`CacheStore::cas_multi`](crate::CacheStore::cas_multi) reads every key
//! with its CAS token in one round trip, hands the live values to a closure
//! and writes back what the closure returns, one conditioned write per key.
//! Each key stands alone: a conflict on one key does not undo the others.

use std::collections::HashMap;
use std::hash::Hash;

use memstore_backend::FaultKind;

/// What happened to one key of a `cas_multi` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasStatus {
    /// The new value was written.
    Stored,
    /// Another writer got there first; its value stays.
    Conflict,
    /// The key was not read (absent or expired), or was deleted before the
    /// write. Nothing was written.
    Missing,
    /// The store is read-only; the write was suppressed.
    Skipped,
    /// The write failed and the fault was swallowed.
    Failed(FaultKind),
}

impl CasStatus {
    /// Returns `true` for [`CasStatus::Stored`].
    pub fn is_stored(self) -> bool {
        self == CasStatus::Stored
    }
}

/// Result of a `cas_multi` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasMulti<K: Eq + Hash> {
    /// No keys were given; nothing was read and the closure did not run.
    Empty,
    /// The closure ran. Holds one status per key it returned.
    Completed(HashMap<K, CasStatus>),
    /// The batched read failed and the fault was swallowed. The closure did
    /// not run.
    Aborted,
}

impl<K: Eq + Hash> CasMulti<K> {
    /// Returns `true` if the closure ran.
    pub fn is_success(&self) -> bool {
        matches!(self, CasMulti::Completed(_))
    }

    /// Per-key statuses, if the closure ran.
    pub fn statuses(&self) -> Option<&HashMap<K, CasStatus>> {
        match self {
            CasMulti::Completed(statuses) => Some(statuses),
            _ => None,
        }
    }

    /// Status of `key`, if the closure ran and returned it.
    pub fn status(&self, key: &K) -> Option<CasStatus> {
        self.statuses()
            .and_then(|statuses| statuses.get(key))
            .copied()
    }
}
