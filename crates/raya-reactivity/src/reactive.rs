//! Wrapper construction and identity caches
//!
//! Each of the four variants keeps a per-thread cache from target identity
//! to the target's canonical wrapper. Entries hold both sides weakly: the
//! wrapper keeps its target alive, and nothing here keeps either alive, so
//! a wrapper lives exactly as long as someone holds it.

use crate::base_handlers::ReactiveHandler;
use crate::flags::ReactiveFlags;
use crate::object::{ObjectKind, ObjectRef, WeakObjectRef};
use crate::options::dev_warn;
use crate::proxy::{new_proxy, unwrap_proxy_deep};
use crate::reflect;
use crate::value::Value;
use crate::Result;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

struct CacheEntry {
    target: WeakObjectRef,
    proxy: WeakObjectRef,
}

/// Entries kept before the first sweep of dead entries
const MIN_PRUNE_THRESHOLD: usize = 64;

/// Target identity → canonical wrapper, for one variant
///
/// Dead entries are swept only once the map has doubled since the last
/// sweep, so inserts stay amortized O(1).
struct ProxyCache {
    entries: FxHashMap<usize, CacheEntry>,
    prune_at: usize,
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }
}

impl ProxyCache {
    fn get(&self, target: &ObjectRef) -> Option<ObjectRef> {
        let entry = self.entries.get(&target.id())?;
        // Addresses are reused once a target is freed.
        let cached_target = entry.target.upgrade()?;
        if !cached_target.ptr_eq(target) {
            return None;
        }
        entry.proxy.upgrade()
    }

    fn insert(&mut self, target: &ObjectRef, proxy: &ObjectRef) {
        if self.entries.len() >= self.prune_at {
            self.prune();
        }
        self.entries.insert(
            target.id(),
            CacheEntry {
                target: target.downgrade(),
                proxy: proxy.downgrade(),
            },
        );
    }

    fn prune(&mut self) {
        self.entries
            .retain(|_, entry| entry.target.upgrade().is_some() && entry.proxy.upgrade().is_some());
        self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE_THRESHOLD);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn variant_index(readonly: bool, shallow: bool) -> usize {
    ((readonly as usize) << 1) | (shallow as usize)
}

thread_local! {
    static PROXY_CACHES: RefCell<[ProxyCache; 4]> = RefCell::new(Default::default());
}

/// The live canonical wrapper of `target` for a variant, if any
pub(crate) fn cached_proxy(target: &ObjectRef, readonly: bool, shallow: bool) -> Option<ObjectRef> {
    PROXY_CACHES.with(|caches| caches.borrow()[variant_index(readonly, shallow)].get(target))
}

fn read_flag(value: &Value, flag: ReactiveFlags) -> Value {
    if !value.is_object() {
        return Value::Undefined;
    }
    value.get(flag.as_str()).unwrap_or_default()
}

/// Whether the object can be wrapped at all: plain objects, arrays and
/// boxes, not opted out, still extensible
fn is_wrappable(target: &ObjectRef) -> bool {
    if read_flag(&Value::Object(target.clone()), ReactiveFlags::Skip).is_truthy() {
        return false;
    }
    if !reflect::is_extensible(target) {
        return false;
    }
    match unwrap_proxy_deep(&Value::Object(target.clone())) {
        Value::Object(inner) => matches!(
            inner.borrow().kind,
            ObjectKind::Ordinary | ObjectKind::Array(_) | ObjectKind::Ref(_)
        ),
        _ => false,
    }
}

fn create_reactive_object(target: &Value, readonly: bool, shallow: bool) -> Result<Value> {
    let Some(obj) = target.as_object() else {
        dev_warn(format_args!(
            "value cannot be made {}: {:?}",
            if readonly { "readonly" } else { "reactive" },
            target
        ));
        return Ok(target.clone());
    };

    // Already a wrapper: keep it, unless a mutable wrapper is being made
    // read-only.
    if read_flag(target, ReactiveFlags::Raw).is_truthy()
        && !(readonly && read_flag(target, ReactiveFlags::IsReactive).is_truthy())
    {
        return Ok(target.clone());
    }

    if !is_wrappable(obj) {
        return Ok(target.clone());
    }

    if let Some(existing) = cached_proxy(obj, readonly, shallow) {
        return Ok(Value::Object(existing));
    }

    let handler = Rc::new(ReactiveHandler::new(readonly, shallow));
    let proxy = new_proxy(obj, handler);
    if let Value::Object(proxy_obj) = &proxy {
        PROXY_CACHES.with(|caches| {
            caches.borrow_mut()[variant_index(readonly, shallow)].insert(obj, proxy_obj)
        });
    }
    tracing::trace!(target: "raya_reactivity", readonly, shallow, "created wrapper for {:?}", obj);
    Ok(proxy)
}

// ============================================================================
// Constructors
// ============================================================================

/// Deep mutable wrapper
///
/// A read-only wrapper is returned unchanged.
pub fn reactive(target: &Value) -> Result<Value> {
    if is_readonly(target) {
        return Ok(target.clone());
    }
    create_reactive_object(target, false, false)
}

/// Mutable wrapper that does not wrap nested values
pub fn shallow_reactive(target: &Value) -> Result<Value> {
    create_reactive_object(target, false, true)
}

/// Deep read-only wrapper
pub fn readonly(target: &Value) -> Result<Value> {
    create_reactive_object(target, true, false)
}

/// Read-only wrapper that does not wrap nested values
pub fn shallow_readonly(target: &Value) -> Result<Value> {
    create_reactive_object(target, true, true)
}

/// `reactive(value)` for objects, `value` otherwise
pub fn to_reactive(value: &Value) -> Result<Value> {
    if value.is_object() {
        reactive(value)
    } else {
        Ok(value.clone())
    }
}

/// `readonly(value)` for objects, `value` otherwise
pub fn to_readonly(value: &Value) -> Result<Value> {
    if value.is_object() {
        readonly(value)
    } else {
        Ok(value.clone())
    }
}

// ============================================================================
// Predicates and canonicalization
// ============================================================================

/// Whether `value` is a mutable wrapper (or a read-only wrapper over one)
pub fn is_reactive(value: &Value) -> bool {
    if is_readonly(value) {
        return is_reactive(&read_flag(value, ReactiveFlags::Raw));
    }
    read_flag(value, ReactiveFlags::IsReactive).is_truthy()
}

pub fn is_readonly(value: &Value) -> bool {
    read_flag(value, ReactiveFlags::IsReadonly).is_truthy()
}

pub fn is_shallow(value: &Value) -> bool {
    read_flag(value, ReactiveFlags::IsShallow).is_truthy()
}

/// Whether `value` is a wrapper created by this crate
pub fn is_proxy(value: &Value) -> bool {
    read_flag(value, ReactiveFlags::Raw).is_truthy()
}

/// Canonical form: the target reached by unwrapping every wrapper layer
pub fn to_raw(observed: &Value) -> Value {
    let raw = read_flag(observed, ReactiveFlags::Raw);
    if raw.is_truthy() {
        to_raw(&raw)
    } else {
        observed.clone()
    }
}

/// Opt `value` out of wrapping. Non-extensible objects are left alone.
pub fn mark_raw(value: &Value) -> Value {
    if let Value::Object(inner) = unwrap_proxy_deep(value) {
        if reflect::is_extensible(&inner) {
            inner.borrow_mut().skip = true;
        }
    }
    value.clone()
}
