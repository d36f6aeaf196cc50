//! Where the store reports faults.
//!
//! The store never writes to the global `tracing` subscriber on its own. It
//! holds a [`Logger`], which either wraps a [`Dispatch`] or is disabled, and
//! emits every record through it. A disabled logger is a valid, silent
//! configuration and the default.
//!
//! ```
//! use memstore::Logger;
//!
//! let logger = Logger::disabled();
//! assert!(!logger.is_enabled());
//!
//! // Capture whatever subscriber is current when the store is built.
//! let logger = Logger::current();
//! assert!(logger.is_enabled());
//! ```

use std::fmt;

use tracing::Dispatch;
use tracing::dispatcher;

/// Optional sink for the store's log records.
#[derive(Clone, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    /// A logger that drops every record.
    pub fn disabled() -> Self {
        Logger { dispatch: None }
    }

    /// A logger that sends records to `dispatch`.
    pub fn new(dispatch: impl Into<Dispatch>) -> Self {
        Logger {
            dispatch: Some(dispatch.into()),
        }
    }

    /// A logger bound to the subscriber that is current right now.
    pub fn current() -> Self {
        Logger {
            dispatch: Some(dispatcher::get_default(Dispatch::clone)),
        }
    }

    /// Returns `true` unless the logger is disabled.
    pub fn is_enabled(&self) -> bool {
        self.dispatch.is_some()
    }

    /// Runs `record` with this logger's dispatcher as the default.
    pub(crate) fn emit(&self, record: impl FnOnce()) {
        if let Some(dispatch) = &self.dispatch {
            dispatcher::with_default(dispatch, record);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
