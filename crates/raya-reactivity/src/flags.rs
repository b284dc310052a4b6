//! Sentinel keys
//!
//! A closed set of string keys every intercepted read special-cases before
//! any generic handling, plus the keys whose reads are structural rather
//! than data accesses and are therefore never tracked.

use crate::value::PropertyKey;

/// Sentinel property keys answered by the handlers themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactiveFlags {
    /// Producer opted the value out of wrapping (read from the target)
    Skip,
    /// Wrapper is the mutable variant
    IsReactive,
    /// Wrapper is a read-only variant
    IsReadonly,
    /// Wrapper is a shallow variant
    IsShallow,
    /// Yields the target to its canonical wrapper
    Raw,
    /// Set on indirection boxes
    IsRef,
}

impl ReactiveFlags {
    /// The sentinels the handlers answer directly
    pub const HANDLED: [ReactiveFlags; 5] = [
        ReactiveFlags::Skip,
        ReactiveFlags::IsReactive,
        ReactiveFlags::IsReadonly,
        ReactiveFlags::IsShallow,
        ReactiveFlags::Raw,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ReactiveFlags::Skip => "__v_skip",
            ReactiveFlags::IsReactive => "__v_isReactive",
            ReactiveFlags::IsReadonly => "__v_isReadonly",
            ReactiveFlags::IsShallow => "__v_isShallow",
            ReactiveFlags::Raw => "__v_raw",
            ReactiveFlags::IsRef => "__v_isRef",
        }
    }

    pub fn key(self) -> PropertyKey {
        PropertyKey::from(self.as_str())
    }

    /// Sentinel answered by the handlers, if `key` is one
    pub fn from_key(key: &PropertyKey) -> Option<Self> {
        let s = key.as_str()?;
        Self::HANDLED.into_iter().find(|flag| flag.as_str() == s)
    }
}

/// Own keys that are protocol markers, never tracked
const NON_TRACKABLE_KEYS: [&str; 3] = ["__proto__", "__v_isRef", "__isRaya"];

/// Whether a read of `key` is structural and must not be tracked
///
/// Covers the fixed marker keys and every well-known symbol.
pub fn is_untracked_key(key: &PropertyKey) -> bool {
    match key {
        PropertyKey::Symbol(_) => key.is_builtin_symbol(),
        PropertyKey::String(s) => NON_TRACKABLE_KEYS.contains(&s.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Symbol, WellKnownSymbol};

    #[test]
    fn test_from_key() {
        for flag in ReactiveFlags::HANDLED {
            assert_eq!(ReactiveFlags::from_key(&flag.key()), Some(flag));
        }
        assert_eq!(ReactiveFlags::from_key(&ReactiveFlags::IsRef.key()), None);
        assert_eq!(ReactiveFlags::from_key(&PropertyKey::from("value")), None);
        assert_eq!(ReactiveFlags::from_key(&PropertyKey::from(Symbol::iterator())), None);
    }

    #[test]
    fn test_untracked_keys() {
        assert!(is_untracked_key(&PropertyKey::from("__proto__")));
        assert!(is_untracked_key(&PropertyKey::from("__v_isRef")));
        assert!(!is_untracked_key(&PropertyKey::from("value")));
        for sym in WellKnownSymbol::ALL {
            assert!(is_untracked_key(&PropertyKey::from(Symbol::WellKnown(sym))));
        }
        assert!(!is_untracked_key(&PropertyKey::from(Symbol::new(Some("user")))));
    }
}
