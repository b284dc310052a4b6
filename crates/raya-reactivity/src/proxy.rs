//! Proxy Object Support
//!
//! This module provides the handler trait proxies dispatch to, plus helpers
//! for detecting and unwrapping proxy objects.
//!
//! ## Proxy Traps
//!
//! Proxy traps allow intercepting operations on objects:
//! - `get(target, key, receiver)` - intercept property read
//! - `set(target, key, value, receiver)` - intercept property write
//! - `has(target, key)` - intercept `in` checks
//! - `delete_property(target, key)` - intercept `delete`
//! - `own_keys(target)` - intercept key enumeration
//!
//! Every trap has a default body that forwards to the corresponding
//! [`reflect`](crate::reflect) primitive, so a handler only overrides the
//! operations it cares about. Operations without a trap (prototype lookup,
//! own-property checks, property creation on a receiver) always forward to
//! the target.

use crate::object::{ObjectRef, ProxyData};
use crate::reflect;
use crate::value::{PropertyKey, Value};
use crate::Result;
use std::rc::Rc;

/// Interception table attached to a proxy
pub trait ProxyHandler {
    /// Property read. `receiver` is the value the read started on (the
    /// proxy itself, or an object inheriting from it).
    fn get(&self, target: &ObjectRef, key: &PropertyKey, receiver: &Value) -> Result<Value> {
        reflect::get(target, key, receiver)
    }

    /// Property write. Returns whether the assignment happened.
    fn set(
        &self,
        target: &ObjectRef,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> Result<bool> {
        reflect::set(target, key, value, receiver)
    }

    /// Existence check along the prototype chain
    fn has(&self, target: &ObjectRef, key: &PropertyKey) -> Result<bool> {
        reflect::has(target, key)
    }

    /// Own-property removal. Returns whether the deletion succeeded.
    fn delete_property(&self, target: &ObjectRef, key: &PropertyKey) -> Result<bool> {
        reflect::delete_property(target, key)
    }

    /// Own key enumeration
    fn own_keys(&self, target: &ObjectRef) -> Result<Vec<PropertyKey>> {
        reflect::own_keys(target)
    }
}

/// Handler with no traps: every operation reaches the target unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardingHandler;

impl ProxyHandler for ForwardingHandler {}

/// Create a proxy over `target`
pub fn new_proxy(target: &ObjectRef, handler: Rc<dyn ProxyHandler>) -> Value {
    Value::Object(ObjectRef::new_proxy(target.clone(), handler))
}

/// Check if a value is a proxy and return its target and handler
pub fn try_unwrap_proxy(value: &Value) -> Option<ProxyData> {
    value.as_object()?.proxy_parts()
}

/// Recursively unwrap nested proxies to get the innermost target
pub fn unwrap_proxy_deep(value: &Value) -> Value {
    let mut current = value.clone();
    while let Some(data) = try_unwrap_proxy(&current) {
        current = Value::Object(data.target);
    }
    current
}
