//! Interception handlers for plain objects and arrays
//!
//! One parameterized handler covers the four variants: mutable or
//! read-only, deep or shallow. The variants differ only in a few policy
//! checks:
//!
//! | | reads tracked | nested values wrapped | writes |
//! |---|---|---|---|
//! | [`MUTABLE_HANDLERS`] | yes | reactive | tracked, triggered |
//! | [`SHALLOW_REACTIVE_HANDLERS`] | yes | no | triggered, stored as-is |
//! | [`READONLY_HANDLERS`] | no | read-only | refused |
//! | [`SHALLOW_READONLY_HANDLERS`] | no | no | refused |
//!
//! Refused writes and deletes report success and leave the target
//! untouched. Read-only variants forward `has` and `own_keys` without
//! tracking.

use crate::array_instrumentations;
use crate::builtins;
use crate::dep::{self, DepKey, TrackOp, TriggerOp};
use crate::flags::{is_untracked_key, ReactiveFlags};
use crate::object::ObjectRef;
use crate::options::dev_warn;
use crate::proxy::ProxyHandler;
use crate::reactive::{self, cached_proxy, is_readonly, is_shallow, to_raw};
use crate::reflect;
use crate::refs::is_ref;
use crate::value::{PropertyKey, Value};
use crate::{Error, Result};

const LENGTH: &str = "length";

/// Interception policy for one wrapper variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactiveHandler {
    readonly: bool,
    shallow: bool,
}

/// Deep mutable variant (`reactive`)
pub const MUTABLE_HANDLERS: ReactiveHandler = ReactiveHandler::new(false, false);

/// Deep read-only variant (`readonly`)
pub const READONLY_HANDLERS: ReactiveHandler = ReactiveHandler::new(true, false);

/// Shallow mutable variant (`shallow_reactive`)
pub const SHALLOW_REACTIVE_HANDLERS: ReactiveHandler = ReactiveHandler::new(false, true);

/// Shallow read-only variant (`shallow_readonly`)
pub const SHALLOW_READONLY_HANDLERS: ReactiveHandler = ReactiveHandler::new(true, true);

impl ReactiveHandler {
    pub const fn new(readonly: bool, shallow: bool) -> Self {
        Self { readonly, shallow }
    }

    pub const fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub const fn is_shallow(&self) -> bool {
        self.shallow
    }

    /// Whether `receiver` may be handed the raw target
    ///
    /// True for this variant's canonical wrapper of `target`, and for any
    /// receiver sharing `target`'s prototype. The prototype test is loose:
    /// unrelated objects with a common prototype also pass.
    fn is_canonical_receiver(&self, target: &ObjectRef, receiver: &Value) -> bool {
        let Value::Object(receiver) = receiver else {
            return false;
        };
        if cached_proxy(target, self.readonly, self.shallow)
            .map(|proxy| proxy.ptr_eq(receiver))
            .unwrap_or(false)
        {
            return true;
        }
        reflect::get_prototype_of(target) == reflect::get_prototype_of(receiver)
    }

    /// Answer a sentinel read, if `key` is one
    fn flag(&self, target: &ObjectRef, key: &PropertyKey, receiver: &Value) -> Result<Option<Value>> {
        let value = match ReactiveFlags::from_key(key) {
            Some(ReactiveFlags::Skip) => {
                reflect::get(target, key, &Value::Object(target.clone()))?
            }
            Some(ReactiveFlags::IsReactive) => Value::Bool(!self.readonly),
            Some(ReactiveFlags::IsReadonly) => Value::Bool(self.readonly),
            Some(ReactiveFlags::IsShallow) => Value::Bool(self.shallow),
            Some(ReactiveFlags::Raw) => {
                if self.is_canonical_receiver(target, receiver) {
                    Value::Object(target.clone())
                } else {
                    Value::Undefined
                }
            }
            Some(ReactiveFlags::IsRef) | None => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// Receiver for native reads and writes: a box is its own receiver
fn native_receiver<'a>(target_value: &'a Value, receiver: &'a Value) -> &'a Value {
    if is_ref(target_value) {
        target_value
    } else {
        receiver
    }
}

// ============================================================================
// hasOwnProperty replacement
// ============================================================================

/// `hasOwnProperty` as seen through a mutable wrapper: checks the canonical
/// target and tracks `(target, has, key)`
fn has_own_property(this: &Value, args: &[Value]) -> Result<Value> {
    let key = match args.first() {
        Some(Value::Symbol(sym)) => PropertyKey::from(sym.clone()),
        Some(other) => PropertyKey::from(builtins::to_string(other)?),
        None => PropertyKey::from("undefined"),
    };
    match to_raw(this) {
        Value::Object(obj) => {
            dep::track(&obj, TrackOp::Has, &key);
            Ok(Value::Bool(reflect::has_own(&obj, &key)))
        }
        _ => Err(Error::TypeError(
            "Cannot convert undefined or null to object".to_string(),
        )),
    }
}

thread_local! {
    static HAS_OWN_PROPERTY: Value = Value::function("hasOwnProperty", has_own_property);
}

/// The `hasOwnProperty` function mutable wrappers hand out (stable identity)
pub fn has_own_property_fn() -> Value {
    HAS_OWN_PROPERTY.with(Value::clone)
}

// ============================================================================
// Traps
// ============================================================================

impl ProxyHandler for ReactiveHandler {
    fn get(&self, target: &ObjectRef, key: &PropertyKey, receiver: &Value) -> Result<Value> {
        if let Some(flag) = self.flag(target, key, receiver)? {
            return Ok(flag);
        }

        let target_value = Value::Object(target.clone());
        let target_is_array = reflect::is_array(&target_value);

        if !self.readonly {
            if target_is_array {
                if let Some(method) = array_instrumentations::lookup(key) {
                    return Ok(method);
                }
            }
            if key.as_str() == Some("hasOwnProperty") {
                return Ok(has_own_property_fn());
            }
        }

        let res = reflect::get(target, key, native_receiver(&target_value, receiver))?;

        if is_untracked_key(key) {
            return Ok(res);
        }

        if !self.readonly {
            dep::track(target, TrackOp::Get, key);
        }

        if self.shallow {
            return Ok(res);
        }

        if is_ref(&res) {
            // Boxes stored at array indices stay boxed
            if target_is_array && key.is_integer_key() {
                return Ok(res);
            }
            return res.get("value");
        }

        if res.is_object() {
            return if self.readonly {
                reactive::readonly(&res)
            } else {
                reactive::reactive(&res)
            };
        }

        Ok(res)
    }

    fn set(
        &self,
        target: &ObjectRef,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> Result<bool> {
        if self.readonly {
            dev_warn(format_args!(
                "Set operation on key \"{}\" failed: target is readonly.",
                key
            ));
            return Ok(true);
        }

        let target_value = Value::Object(target.clone());
        let target_is_array = reflect::is_array(&target_value);
        let mut old_value = reflect::get(target, key, &target_value)?;
        let mut value = value;

        if !self.shallow {
            let old_is_readonly = is_readonly(&old_value);
            if !is_shallow(&value) && !is_readonly(&value) {
                old_value = to_raw(&old_value);
                value = to_raw(&value);
            }
            // Assigning a plain value over a box writes through the box
            if !target_is_array && is_ref(&old_value) && !is_ref(&value) {
                if old_is_readonly {
                    return Ok(false);
                }
                old_value.set("value", value)?;
                return Ok(true);
            }
        }

        let had_key = match key.as_index() {
            Some(index) if target_is_array => index < target_value.length()?,
            _ => reflect::has_own(target, key),
        };
        let result = reflect::set(
            target,
            key,
            value.clone(),
            native_receiver(&target_value, receiver),
        )?;

        // Writes on objects further down a prototype chain are theirs to report
        if to_raw(receiver) == target_value {
            if !had_key {
                dep::trigger(target, TriggerOp::Add, key, Some(&value), None);
            } else if !value.same_value(&old_value) {
                dep::trigger(target, TriggerOp::Set, key, Some(&value), Some(&old_value));
            }
        }
        Ok(result)
    }

    fn delete_property(&self, target: &ObjectRef, key: &PropertyKey) -> Result<bool> {
        if self.readonly {
            dev_warn(format_args!(
                "Delete operation on key \"{}\" failed: target is readonly.",
                key
            ));
            return Ok(true);
        }

        let had_key = reflect::has_own(target, key);
        let old_value = reflect::get(target, key, &Value::Object(target.clone()))?;
        let result = reflect::delete_property(target, key)?;
        if result && had_key {
            dep::trigger(target, TriggerOp::Delete, key, None, Some(&old_value));
        }
        Ok(result)
    }

    fn has(&self, target: &ObjectRef, key: &PropertyKey) -> Result<bool> {
        let result = reflect::has(target, key)?;
        if !self.readonly && !key.is_builtin_symbol() {
            dep::track(target, TrackOp::Has, key);
        }
        Ok(result)
    }

    fn own_keys(&self, target: &ObjectRef) -> Result<Vec<PropertyKey>> {
        if !self.readonly {
            let key = if reflect::is_array(&Value::Object(target.clone())) {
                DepKey::from(LENGTH)
            } else {
                DepKey::Iterate
            };
            dep::track(target, TrackOp::Iterate, key);
        }
        reflect::own_keys(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep::{set_dependency_graph, DependencyGraph, EventRecorder};
    use crate::reactive::{reactive, readonly, shallow_reactive, shallow_readonly};
    use crate::refs::{new_ref, readonly_ref, ref_value};
    use crate::value::{Symbol, WellKnownSymbol};
    use serde_json::json;
    use std::rc::Rc;

    struct Recording {
        rec: Rc<EventRecorder>,
        previous: Option<Rc<dyn DependencyGraph>>,
    }

    impl Recording {
        fn start() -> Self {
            let rec = EventRecorder::new();
            let previous = Some(rec.install());
            Self { rec, previous }
        }
    }

    impl Drop for Recording {
        fn drop(&mut self) {
            if let Some(previous) = self.previous.take() {
                set_dependency_graph(previous);
            }
        }
    }

    fn raw_obj(value: &Value) -> ObjectRef {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_flags_reflect_variant() {
        let target = Value::from(json!({}));
        for (wrapper, readonly_flag, shallow_flag) in [
            (reactive(&target).unwrap(), false, false),
            (shallow_reactive(&target).unwrap(), false, true),
            (readonly(&target).unwrap(), true, false),
            (shallow_readonly(&target).unwrap(), true, true),
        ] {
            assert_eq!(wrapper.get("__v_isReactive").unwrap(), Value::Bool(!readonly_flag));
            assert_eq!(wrapper.get("__v_isReadonly").unwrap(), Value::Bool(readonly_flag));
            assert_eq!(wrapper.get("__v_isShallow").unwrap(), Value::Bool(shallow_flag));
            assert_eq!(wrapper.get("__v_raw").unwrap(), target);
        }
    }

    #[test]
    fn test_flag_reads_are_not_tracked() {
        let target = Value::from(json!({ "a": 1 }));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();
        for flag in ReactiveFlags::HANDLED {
            wrapper.get(flag.as_str()).unwrap();
        }
        assert!(recording.rec.tracks().is_empty());
    }

    #[test]
    fn test_raw_recognizes_same_prototype_receiver() {
        let target = raw_obj(&Value::from(json!({})));
        let stranger = Value::Object(ObjectRef::new_object());
        let raw = MUTABLE_HANDLERS.get(&target, &ReactiveFlags::Raw.key(), &stranger).unwrap();
        assert_eq!(raw, Value::Object(target.clone()));

        let orphan = Value::Object(ObjectRef::with_prototype(crate::ObjectKind::Ordinary, None));
        let raw = MUTABLE_HANDLERS.get(&target, &ReactiveFlags::Raw.key(), &orphan).unwrap();
        assert_eq!(raw, Value::Undefined);
    }

    #[test]
    fn test_get_tracks_once_and_wraps_lazily() {
        let target = Value::from(json!({ "a": 1, "nested": { "b": 2 } }));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();

        assert_eq!(wrapper.get("a").unwrap(), Value::from(1));
        assert_eq!(recording.rec.count_tracks(&raw_obj(&target), TrackOp::Get, "a"), 1);

        let nested = wrapper.get("nested").unwrap();
        assert!(crate::reactive::is_reactive(&nested));
        assert_eq!(nested, wrapper.get("nested").unwrap());
        assert_eq!(to_raw(&nested), target.get("nested").unwrap());
    }

    #[test]
    fn test_readonly_get_wraps_readonly_without_tracking() {
        let target = Value::from(json!({ "nested": {} }));
        let wrapper = readonly(&target).unwrap();
        let recording = Recording::start();
        let nested = wrapper.get("nested").unwrap();
        assert!(is_readonly(&nested));
        assert!(recording.rec.tracks().is_empty());
    }

    #[test]
    fn test_shallow_get_returns_raw_nested() {
        let target = Value::from(json!({ "nested": {} }));
        let raw_nested = target.get("nested").unwrap();
        assert_eq!(shallow_reactive(&target).unwrap().get("nested").unwrap(), raw_nested);
        assert_eq!(shallow_readonly(&target).unwrap().get("nested").unwrap(), raw_nested);
    }

    #[test]
    fn test_untracked_keys() {
        let target = Value::from(json!({}));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();
        wrapper.get("__proto__").unwrap();
        wrapper.get("__v_isRef").unwrap();
        wrapper.get(Symbol::WellKnown(WellKnownSymbol::ToStringTag)).unwrap();
        assert!(recording.rec.tracks().is_empty());

        let local = Symbol::new(Some("local"));
        wrapper.get(local.clone()).unwrap();
        assert_eq!(
            recording.rec.count_tracks(&raw_obj(&target), TrackOp::Get, PropertyKey::from(local)),
            1
        );
    }

    #[test]
    fn test_box_unwrapping() {
        let boxed = new_ref(1).unwrap();
        let obj = Value::from(json!({}));
        obj.set("count", boxed.clone()).unwrap();
        let arr = Value::from(json!([]));
        arr.set(0usize, boxed.clone()).unwrap();

        assert_eq!(reactive(&obj).unwrap().get("count").unwrap(), Value::from(1));
        assert_eq!(reactive(&arr).unwrap().get(0usize).unwrap(), boxed);
        assert_eq!(shallow_reactive(&obj).unwrap().get("count").unwrap(), boxed);
    }

    #[test]
    fn test_set_triggers_only_on_change() {
        let target = Value::from(json!({ "a": 1 }));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();

        assert!(wrapper.set("a", 1).unwrap());
        assert!(recording.rec.triggers().is_empty());

        assert!(wrapper.set("a", 2).unwrap());
        assert!(wrapper.set("b", 3).unwrap());
        let triggers = recording.rec.triggers();
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].op, TriggerOp::Set);
        assert_eq!(triggers[0].old_value, Some(Value::from(1)));
        assert_eq!(triggers[1].op, TriggerOp::Add);
        assert_eq!(triggers[1].key, DepKey::from("b"));
        assert_eq!(triggers[1].old_value, None);
    }

    #[test]
    fn test_set_stores_raw_values() {
        let target = Value::from(json!({}));
        let item = Value::from(json!({ "x": 1 }));
        let wrapper = reactive(&target).unwrap();
        let wrapped_item = reactive(&item).unwrap();

        wrapper.set("item", wrapped_item.clone()).unwrap();
        assert_eq!(target.get("item").unwrap(), item);

        // Assigning the raw form over its wrapper is not a change
        let recording = Recording::start();
        wrapper.set("item", item.clone()).unwrap();
        assert!(recording.rec.triggers().is_empty());

        // Read-only values are stored as given
        let frozen = readonly(&item).unwrap();
        wrapper.set("frozen", frozen.clone()).unwrap();
        assert_eq!(target.get("frozen").unwrap(), frozen);
    }

    #[test]
    fn test_set_writes_through_box() {
        let boxed = new_ref(1).unwrap();
        let target = Value::from(json!({}));
        target.set("count", boxed.clone()).unwrap();
        let wrapper = reactive(&target).unwrap();

        let recording = Recording::start();
        assert!(wrapper.set("count", 5).unwrap());
        assert_eq!(ref_value(&boxed).unwrap(), Value::from(5));
        assert_eq!(target.get("count").unwrap(), boxed);
        let triggers = recording.rec.triggers();
        assert_eq!(triggers.len(), 1);
        assert!(triggers[0].target.ptr_eq(&raw_obj(&boxed)));
    }

    #[test]
    fn test_set_over_readonly_box_fails() {
        let boxed = readonly_ref(1).unwrap();
        let target = Value::from(json!({}));
        target.set("count", boxed.clone()).unwrap();
        let wrapper = reactive(&target).unwrap();

        assert!(!wrapper.set("count", 5).unwrap());
        assert_eq!(ref_value(&boxed).unwrap(), Value::from(1));
        assert_eq!(target.get("count").unwrap(), boxed);
    }

    #[test]
    fn test_set_through_prototype_chain_does_not_trigger_parent() {
        let parent = Value::from(json!({}));
        let wrapper = reactive(&parent).unwrap();
        let child = Value::Object(ObjectRef::with_prototype(
            crate::ObjectKind::Ordinary,
            wrapper.as_object().cloned(),
        ));

        let recording = Recording::start();
        assert!(child.set("x", 1).unwrap());
        assert!(recording.rec.triggers().is_empty());
        assert!(reflect::has_own(&raw_obj(&child), &PropertyKey::from("x")));
        assert!(!reflect::has_own(&raw_obj(&parent), &PropertyKey::from("x")));
    }

    #[test]
    fn test_array_index_set_had_key() {
        let target = Value::from(json!([1]));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();
        wrapper.set(0usize, 5).unwrap();
        wrapper.set(1usize, 6).unwrap();
        let ops: Vec<TriggerOp> = recording.rec.triggers().iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![TriggerOp::Set, TriggerOp::Add]);
    }

    #[test]
    fn test_delete_triggers_when_key_existed() {
        let target = Value::from(json!({ "a": 1 }));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();

        assert!(wrapper.delete("a").unwrap());
        assert!(wrapper.delete("missing").unwrap());
        let triggers = recording.rec.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].op, TriggerOp::Delete);
        assert_eq!(triggers[0].old_value, Some(Value::from(1)));
        assert!(!target.has("a").unwrap());
    }

    #[test]
    fn test_failed_delete_does_not_trigger() {
        let array = reactive(&Value::from(json!([1, 2]))).unwrap();
        let boxed = new_ref(1).unwrap();
        let box_wrapper = reactive(&boxed).unwrap();
        let recording = Recording::start();

        // Both keys exist, but neither slot can be removed
        assert!(!array.delete("length").unwrap());
        assert!(!box_wrapper.delete("value").unwrap());

        assert_eq!(array.length().unwrap(), 2);
        assert_eq!(ref_value(&boxed).unwrap(), Value::from(1));
        assert!(recording
            .rec
            .triggers()
            .iter()
            .all(|event| event.op != TriggerOp::Delete));
    }

    #[test]
    fn test_sparse_array_writes_are_bounded() {
        let target = Value::from(json!([1]));
        let wrapper = reactive(&target).unwrap();

        assert!(!wrapper.set(4_000_000_000usize, 2).unwrap());
        assert!(!wrapper.set(reflect::MAX_DENSE_LENGTH, 2).unwrap());
        assert!(matches!(
            wrapper.set("length", 4_000_000_000.0),
            Err(Error::RangeError(_))
        ));
        assert_eq!(target.length().unwrap(), 1);

        assert!(wrapper.set(3usize, 4).unwrap());
        assert_eq!(target.length().unwrap(), 4);
    }

    #[test]
    fn test_readonly_rejects_writes_and_deletes() {
        let target = Value::from(json!({ "a": 1 }));
        let wrapper = readonly(&target).unwrap();
        let recording = Recording::start();

        assert!(wrapper.set("a", 2).unwrap());
        assert!(wrapper.delete("a").unwrap());
        assert_eq!(target.get("a").unwrap(), Value::from(1));
        assert!(recording.rec.triggers().is_empty());
    }

    #[test]
    fn test_has_tracks_except_builtin_symbols() {
        let target = Value::from(json!({ "a": 1 }));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();

        assert!(wrapper.has("a").unwrap());
        assert!(!wrapper.has("b").unwrap());
        assert!(!wrapper.has(Symbol::iterator()).unwrap());
        let ops: Vec<String> = recording.rec.tracks().iter().map(|e| e.key.to_string()).collect();
        assert_eq!(ops, vec!["a".to_string(), "b".to_string()]);

        recording.rec.clear();
        readonly(&target).unwrap().has("a").unwrap();
        assert!(recording.rec.tracks().is_empty());
    }

    #[test]
    fn test_own_keys_tracks_shape() {
        let obj = Value::from(json!({ "a": 1, "b": 2 }));
        let arr = Value::from(json!([1, 2]));
        let recording = Recording::start();

        let keys = reactive(&obj).unwrap().own_keys().unwrap();
        assert_eq!(keys, vec![PropertyKey::from("a"), PropertyKey::from("b")]);
        reactive(&arr).unwrap().own_keys().unwrap();

        let tracks = recording.rec.tracks();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].matches(&raw_obj(&obj), TrackOp::Iterate, &DepKey::Iterate));
        assert!(tracks[1].matches(&raw_obj(&arr), TrackOp::Iterate, &DepKey::from("length")));
    }

    #[test]
    fn test_has_own_property_replacement() {
        let target = Value::from(json!({ "1": true }));
        let wrapper = reactive(&target).unwrap();
        let recording = Recording::start();

        let method = wrapper.get("hasOwnProperty").unwrap();
        assert_eq!(method, has_own_property_fn());
        assert_eq!(wrapper.invoke("hasOwnProperty", &[Value::from(1)]).unwrap(), Value::Bool(true));
        assert_eq!(wrapper.invoke("hasOwnProperty", &[Value::from("x")]).unwrap(), Value::Bool(false));
        assert_eq!(recording.rec.count_tracks(&raw_obj(&target), TrackOp::Has, "1"), 1);
        assert_eq!(recording.rec.count_tracks(&raw_obj(&target), TrackOp::Get, "hasOwnProperty"), 0);

        // Read-only wrappers use the native method
        let native = readonly(&target).unwrap().get("hasOwnProperty").unwrap();
        assert_ne!(native, has_own_property_fn());
    }

    #[test]
    fn test_box_target_is_its_own_receiver() {
        let boxed = new_ref(1).unwrap();
        let wrapper = reactive(&boxed).unwrap();
        assert_eq!(wrapper.get("value").unwrap(), Value::from(1));
        assert!(wrapper.set("value", 2).unwrap());
        assert_eq!(ref_value(&boxed).unwrap(), Value::from(2));
    }
}
