//! Runtime options
//!
//! Options are per thread, like the rest of the observation state.

use std::cell::Cell;
use std::fmt;

/// Reactivity configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactivityOptions {
    /// Emit development diagnostics (rejected read-only writes, values that
    /// cannot be wrapped). On by default in debug builds.
    pub dev_warnings: bool,
}

impl Default for ReactivityOptions {
    fn default() -> Self {
        Self {
            dev_warnings: cfg!(debug_assertions),
        }
    }
}

impl ReactivityOptions {
    /// Builder-style toggle for development diagnostics
    pub fn with_dev_warnings(mut self, enabled: bool) -> Self {
        self.dev_warnings = enabled;
        self
    }
}

thread_local! {
    static OPTIONS: Cell<ReactivityOptions> = Cell::new(ReactivityOptions::default());
}

/// Options in effect on this thread
pub fn options() -> ReactivityOptions {
    OPTIONS.with(Cell::get)
}

/// Install options for this thread, returning the previous ones
pub fn set_options(options: ReactivityOptions) -> ReactivityOptions {
    OPTIONS.with(|cell| cell.replace(options))
}

/// Development-only diagnostic
pub(crate) fn dev_warn(message: fmt::Arguments<'_>) {
    if options().dev_warnings {
        tracing::warn!(target: "raya_reactivity", "{}", message);
    }
}
