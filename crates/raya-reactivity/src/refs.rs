//! Indirection boxes
//!
//! A box is a single-slot object exposing its content through `value`.
//! Reading `value` tracks `(box, get, "value")`; writing it triggers
//! `(box, set, "value")` when the canonical form of the content changes.
//! Wrappers unwrap boxes found in object properties (see the base
//! handlers).

use crate::builtins;
use crate::dep::{self, TrackOp, TriggerOp};
use crate::flags::ReactiveFlags;
use crate::object::{ObjectKind, ObjectRef, RefBox};
use crate::options::dev_warn;
use crate::reactive::{self, to_raw, to_reactive, to_readonly};
use crate::value::{PropertyKey, Value};
use crate::Result;

const VALUE: &str = "value";

fn is_value_key(key: &PropertyKey) -> bool {
    key.as_str() == Some(VALUE)
}

/// Whether `key` is one of a box's built-in slots
pub(crate) fn is_slot_key(key: &PropertyKey) -> bool {
    match key.as_str() {
        Some(s) => {
            s == VALUE
                || s == ReactiveFlags::IsRef.as_str()
                || s == ReactiveFlags::IsReadonly.as_str()
                || s == ReactiveFlags::IsShallow.as_str()
        }
        None => false,
    }
}

fn box_state(obj: &ObjectRef) -> Option<RefBox> {
    match &obj.borrow().kind {
        ObjectKind::Ref(state) => Some(state.clone()),
        _ => None,
    }
}

/// Read a box slot
pub(crate) fn read_slot(obj: &ObjectRef, key: &PropertyKey) -> Result<Option<Value>> {
    let Some(state) = box_state(obj) else {
        return Ok(None);
    };
    let value = match key.as_str() {
        Some(VALUE) => {
            dep::track(obj, TrackOp::Get, VALUE);
            state.value
        }
        Some(s) if s == ReactiveFlags::IsRef.as_str() => Value::Bool(true),
        Some(s) if s == ReactiveFlags::IsReadonly.as_str() => Value::Bool(state.readonly),
        Some(s) if s == ReactiveFlags::IsShallow.as_str() => Value::Bool(state.shallow),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Write a box slot
///
/// Only `value` is writable, and only on a mutable box. Unless the box is
/// shallow (or the incoming value is itself a shallow or read-only wrapper)
/// the canonical form is stored for comparison and the wrapped form is
/// handed out on read.
pub(crate) fn write_slot(obj: &ObjectRef, key: &PropertyKey, value: Value) -> Result<bool> {
    if !is_value_key(key) {
        return Ok(false);
    }
    let Some(state) = box_state(obj) else {
        return Ok(false);
    };
    if state.readonly {
        dev_warn(format_args!(
            "Set operation on key \"{}\" failed: target is readonly.",
            key
        ));
        return Ok(false);
    }

    let use_direct = state.shallow || reactive::is_shallow(&value) || reactive::is_readonly(&value);
    let new_raw = if use_direct { value.clone() } else { to_raw(&value) };
    if new_raw.same_value(&state.raw) {
        return Ok(true);
    }
    let exposed = if use_direct { value } else { to_reactive(&new_raw)? };

    if let ObjectKind::Ref(slot) = &mut obj.borrow_mut().kind {
        slot.raw = new_raw.clone();
        slot.value = exposed;
    }
    dep::trigger(obj, TriggerOp::Set, VALUE, Some(&new_raw), Some(&state.raw));
    Ok(true)
}

fn create_box(raw: Value, value: Value, shallow: bool, readonly: bool) -> Value {
    let state = RefBox {
        raw,
        value,
        shallow,
        readonly,
    };
    Value::Object(ObjectRef::with_prototype(
        ObjectKind::Ref(state),
        Some(builtins::object_prototype()),
    ))
}

/// Create a mutable box; object content is stored wrapped
///
/// An existing box is returned as-is.
pub fn new_ref(value: impl Into<Value>) -> Result<Value> {
    let value = value.into();
    if is_ref(&value) {
        return Ok(value);
    }
    let raw = to_raw(&value);
    let exposed = to_reactive(&value)?;
    Ok(create_box(raw, exposed, false, false))
}

/// Create a mutable box that stores its content as-is
pub fn shallow_ref(value: impl Into<Value>) -> Result<Value> {
    let value = value.into();
    if is_ref(&value) {
        return Ok(value);
    }
    Ok(create_box(value.clone(), value, true, false))
}

/// Create a box whose `value` cannot be reassigned
///
/// Object content is exposed through a read-only wrapper.
pub fn readonly_ref(value: impl Into<Value>) -> Result<Value> {
    let value = value.into();
    let raw = to_raw(&value);
    let exposed = to_readonly(&value)?;
    Ok(create_box(raw, exposed, false, true))
}

/// Whether `value` is a box (seen through wrappers)
pub fn is_ref(value: &Value) -> bool {
    value.is_object() && matches!(value.get(ReactiveFlags::IsRef.as_str()), Ok(Value::Bool(true)))
}

/// Content of a box, or `value` itself when it is not one
pub fn unref(value: &Value) -> Result<Value> {
    if is_ref(value) {
        value.get(VALUE)
    } else {
        Ok(value.clone())
    }
}

/// `box.value`
pub fn ref_value(r: &Value) -> Result<Value> {
    r.get(VALUE)
}

/// `box.value = value`; returns whether the write was accepted
pub fn set_ref_value(r: &Value, value: impl Into<Value>) -> Result<bool> {
    r.set(VALUE, value)
}
