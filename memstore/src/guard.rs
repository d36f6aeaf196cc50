//! The fault guard every transport call runs through.
//!
//! [`Guard::run`] awaits a transport future and sorts a failure with the
//! store's [`FaultClassifier`]:
//!
//! | Fault | Log | Returned |
//! |-------|-----|----------|
//! | `Miss` | none | `Ok(Err(_))` |
//! | `Conflict` | trace | `Ok(Err(_))` |
//! | `NotStored` | debug | `Ok(Err(_))` |
//! | `Transient`, swallowing | warn `memcached error` | `Ok(Err(_))` |
//! | `Transient`, not swallowing | none | `Err(CacheError::Transport)` |
//! | `Fatal` | error | `Err(CacheError::Transport)` |
//!
//! The caller maps `Ok(Err(rejected))` to the operation's safe default.

use memstore_backend::{FaultKind, TransportResult};
use memstore_core::WireKey;

use crate::classify::{Fault, FaultClassifier};
use crate::error::CacheResult;
use crate::instrument::{Operation, Outcome};
use crate::logger::Logger;

/// A transport failure the guard turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rejected {
    pub(crate) fault: Fault,
    pub(crate) kind: FaultKind,
}

impl Rejected {
    /// A write the store declined itself, e.g. over the size limit.
    pub(crate) fn not_stored() -> Self {
        Rejected {
            fault: Fault::NotStored,
            kind: FaultKind::NotStored,
        }
    }

    pub(crate) fn is_miss(self) -> bool {
        self.fault == Fault::Miss
    }

    pub(crate) fn outcome(self) -> Outcome {
        match self.fault {
            Fault::Miss => Outcome::Miss,
            Fault::Conflict => Outcome::Conflict,
            Fault::NotStored => Outcome::NotStored,
            Fault::Transient | Fault::Fatal => Outcome::Error(Some(self.kind)),
        }
    }
}

pub(crate) struct Guard<'a> {
    pub(crate) classifier: &'a FaultClassifier,
    pub(crate) logger: &'a Logger,
    pub(crate) operation: Operation,
    pub(crate) key: Option<&'a WireKey>,
    pub(crate) swallow: bool,
}

impl Guard<'_> {
    /// Same guard for another key.
    pub(crate) fn for_key<'k>(&'k self, key: &'k WireKey) -> Guard<'k> {
        Guard {
            classifier: self.classifier,
            logger: self.logger,
            operation: self.operation,
            key: Some(key),
            swallow: self.swallow,
        }
    }

    pub(crate) async fn run<T>(
        &self,
        call: impl Future<Output = TransportResult<T>>,
    ) -> CacheResult<Result<T, Rejected>> {
        let operation = self.operation.as_str();
        let key = self.key.map(WireKey::as_str);
        let error = match call.await {
            Ok(value) => {
                self.logger.emit(|| tracing::trace!(operation, key, "memcached ok"));
                return Ok(Ok(value));
            }
            Err(error) => error,
        };

        let fault = self.classifier.classify(&error);
        match fault {
            Fault::Miss => {}
            Fault::Conflict => self.logger.emit(|| {
                tracing::trace!(operation, key, "cas conflict");
            }),
            Fault::NotStored => self.logger.emit(|| {
                tracing::debug!(operation, key, "value not stored");
            }),
            Fault::Transient if self.swallow => self.logger.emit(|| {
                tracing::warn!(operation, key, error = %error, "memcached error");
            }),
            Fault::Transient => return Err(error.into()),
            Fault::Fatal => {
                self.logger.emit(|| {
                    tracing::error!(operation, key, error = %error, "memcached fatal error");
                });
                return Err(error.into());
            }
        }

        Ok(Err(Rejected {
            fault,
            kind: error.kind(),
        }))
    }
}
