//! Raya Reactivity
//!
//! Transparent observation layer for Raya heap objects. Plain objects and
//! arrays are wrapped in proxies whose handlers report every read as a
//! *track* and every write as a *trigger* to an installed dependency graph,
//! so consumers keep reading and writing data the usual way.
//!
//! The crate is layered bottom-up:
//! - `value` / `object` / `reflect` / `builtins`: the host object model the
//!   handlers intercept (property tables, prototypes, proxies, native array
//!   methods).
//! - `dep`: the boundary to the dependency graph (track, trigger, pause and
//!   batch scopes) plus a recording graph for tests and embedders.
//! - `flags`, `base_handlers`, `array_instrumentations`: the interception
//!   core.
//! - `reactive` / `refs`: wrapper construction, identity caches and
//!   indirection boxes.

#![warn(rust_2018_idioms)]

pub mod array_instrumentations;
pub mod base_handlers;
pub mod builtins;
pub mod dep;
pub mod flags;
pub mod object;
pub mod options;
pub mod proxy;
pub mod reactive;
pub mod reflect;
pub mod refs;
pub mod value;

pub use array_instrumentations::{reactive_read_array, shallow_read_array};
pub use base_handlers::{
    ReactiveHandler, MUTABLE_HANDLERS, READONLY_HANDLERS, SHALLOW_REACTIVE_HANDLERS,
    SHALLOW_READONLY_HANDLERS,
};
pub use dep::{
    DepKey, DependencyGraph, EventRecorder, TrackEvent, TrackOp, TriggerEvent, TriggerOp,
};
pub use flags::ReactiveFlags;
pub use object::{ObjectKind, ObjectRef};
pub use options::{options, set_options, ReactivityOptions};
pub use proxy::ProxyHandler;
pub use reactive::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly,
};
pub use refs::{is_ref, new_ref, readonly_ref, shallow_ref, unref};
pub use value::{PropertyKey, Symbol, Value, WellKnownSymbol};

/// Errors raised by native object operations
///
/// The interception layer adds no failure modes of its own: these are the
/// errors the underlying primitives (and user callbacks) can raise, and
/// they propagate unmodified through every handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Operation applied to a value of the wrong type
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Numeric argument out of range (e.g. invalid array length)
    #[error("RangeError: {0}")]
    RangeError(String),

    /// A user callback failed with a value
    #[error("uncaught exception: {0:?}")]
    Thrown(Value),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
