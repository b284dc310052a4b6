//! Native object primitives
//!
//! These are the operations the interception handlers call "native":
//! property read/write/delete, existence checks, key enumeration and
//! function calls. Reads and writes walk the prototype chain and dispatch to
//! a proxy's handler whenever they meet one, passing the original receiver
//! along.
//!
//! Only data properties exist. Special own slots:
//! - arrays: integer indices and `length`
//! - functions: `name`
//! - boxes: `value` and the box flags (see [`refs`](crate::refs))
//! - every object: the hidden skip marker, readable through `__v_skip`

use crate::flags::ReactiveFlags;
use crate::object::{ObjectKind, ObjectRef};
use crate::refs;
use crate::value::{PropertyKey, Value};
use crate::{Error, Result};

const LENGTH: &str = "length";

/// Largest array length (`2^32 - 1`)
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Largest length dense element storage grows to. Index writes past it are
/// refused; `length` writes past it are a `RangeError`.
pub const MAX_DENSE_LENGTH: usize = 1 << 24;

// ============================================================================
// Own slots
// ============================================================================

fn is_skip_marker(key: &PropertyKey) -> bool {
    key.as_str() == Some(ReactiveFlags::Skip.as_str())
}

fn get_own(obj: &ObjectRef, key: &PropertyKey) -> Result<Option<Value>> {
    if obj.is_ref_box() && refs::is_slot_key(key) {
        return refs::read_slot(obj, key);
    }
    let data = obj.borrow();
    if data.skip && is_skip_marker(key) {
        return Ok(Some(Value::Bool(true)));
    }
    match &data.kind {
        ObjectKind::Array(elements) => {
            if let Some(index) = key.as_index() {
                return Ok(elements.get(index).cloned());
            }
            if key.as_str() == Some(LENGTH) {
                return Ok(Some(Value::from(elements.len())));
            }
        }
        ObjectKind::Function(func) if key.as_str() == Some("name") => {
            return Ok(Some(Value::String(func.name.clone())));
        }
        _ => {}
    }
    Ok(data.properties.get(key).cloned())
}

fn has_own_slot(obj: &ObjectRef, key: &PropertyKey) -> bool {
    if obj.is_ref_box() && refs::is_slot_key(key) {
        return true;
    }
    let data = obj.borrow();
    if data.skip && is_skip_marker(key) {
        return true;
    }
    match &data.kind {
        ObjectKind::Array(elements) => {
            if let Some(index) = key.as_index() {
                return index < elements.len();
            }
            if key.as_str() == Some(LENGTH) {
                return true;
            }
        }
        ObjectKind::Function(_) if key.as_str() == Some("name") => return true,
        _ => {}
    }
    data.properties.contains_key(key)
}

fn array_length(value: &Value) -> Result<usize> {
    let n = value.to_number();
    if n.is_nan() || n < 0.0 || n.fract() != 0.0 || n > MAX_ARRAY_LENGTH as f64 {
        return Err(Error::RangeError("Invalid array length".to_string()));
    }
    Ok(n as usize)
}

fn write_own(obj: &ObjectRef, key: &PropertyKey, value: Value) -> Result<bool> {
    if obj.is_ref_box() && refs::is_slot_key(key) {
        return refs::write_slot(obj, key, value);
    }
    let mut data = obj.borrow_mut();
    let extensible = data.extensible;
    match &mut data.kind {
        ObjectKind::Array(elements) => {
            if let Some(index) = key.as_index() {
                if index >= elements.len() {
                    if !extensible || index >= MAX_DENSE_LENGTH {
                        return Ok(false);
                    }
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return Ok(true);
            }
            if key.as_str() == Some(LENGTH) {
                let new_len = array_length(&value)?;
                if new_len > MAX_DENSE_LENGTH {
                    return Err(Error::RangeError(format!(
                        "Array length {} exceeds dense storage limit",
                        new_len
                    )));
                }
                elements.resize(new_len, Value::Undefined);
                return Ok(true);
            }
        }
        ObjectKind::Function(_) if key.as_str() == Some("name") => return Ok(false),
        _ => {}
    }
    if !extensible && !data.properties.contains_key(key) {
        return Ok(false);
    }
    data.properties.insert(key.clone(), value);
    Ok(true)
}

/// Create or overwrite an own property on `obj`. Proxies have no trap for
/// this, so it lands on the innermost target.
fn define_on(obj: &ObjectRef, key: &PropertyKey, value: Value) -> Result<bool> {
    match obj.proxy_parts() {
        Some(proxy) => define_on(&proxy.target, key, value),
        None => write_own(obj, key, value),
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// Property read with an explicit receiver
pub fn get(target: &ObjectRef, key: &PropertyKey, receiver: &Value) -> Result<Value> {
    if let Some(proxy) = target.proxy_parts() {
        return proxy.handler.get(&proxy.target, key, receiver);
    }
    if let Some(value) = get_own(target, key)? {
        return Ok(value);
    }
    let prototype = target.borrow().prototype.clone();
    match prototype {
        Some(proto) => get(&proto, key, receiver),
        None => Ok(Value::Undefined),
    }
}

/// Property write with an explicit receiver
///
/// An existing own property is written on the receiver; a missing one is
/// searched for up the prototype chain (proxies found there intercept the
/// write) and finally created on the receiver.
pub fn set(target: &ObjectRef, key: &PropertyKey, value: Value, receiver: &Value) -> Result<bool> {
    if let Some(proxy) = target.proxy_parts() {
        return proxy.handler.set(&proxy.target, key, value, receiver);
    }
    if has_own_slot(target, key) {
        return match receiver {
            Value::Object(obj) if obj.ptr_eq(target) => write_own(target, key, value),
            Value::Object(obj) => define_on(obj, key, value),
            _ => Ok(false),
        };
    }
    let prototype = target.borrow().prototype.clone();
    match (prototype, receiver) {
        (Some(proto), _) => set(&proto, key, value, receiver),
        (None, Value::Object(obj)) => define_on(obj, key, value),
        (None, _) => Ok(false),
    }
}

/// Existence check along the prototype chain (`key in target`)
pub fn has(target: &ObjectRef, key: &PropertyKey) -> Result<bool> {
    if let Some(proxy) = target.proxy_parts() {
        return proxy.handler.has(&proxy.target, key);
    }
    if has_own_slot(target, key) {
        return Ok(true);
    }
    let prototype = target.borrow().prototype.clone();
    match prototype {
        Some(proto) => has(&proto, key),
        None => Ok(false),
    }
}

/// Own-property existence check (no trap; proxies forward to their target)
pub fn has_own(target: &ObjectRef, key: &PropertyKey) -> bool {
    match target.proxy_parts() {
        Some(proxy) => has_own(&proxy.target, key),
        None => has_own_slot(target, key),
    }
}

/// Own-property removal
///
/// Arrays are dense: deleting an index leaves `undefined` in the slot.
/// Built-in slots (`length`, box slots, `name`) cannot be deleted.
pub fn delete_property(target: &ObjectRef, key: &PropertyKey) -> Result<bool> {
    if let Some(proxy) = target.proxy_parts() {
        return proxy.handler.delete_property(&proxy.target, key);
    }
    if target.is_ref_box() && refs::is_slot_key(key) {
        return Ok(false);
    }
    let mut data = target.borrow_mut();
    if data.skip && is_skip_marker(key) {
        return Ok(false);
    }
    match &mut data.kind {
        ObjectKind::Array(elements) => {
            if let Some(index) = key.as_index() {
                if let Some(slot) = elements.get_mut(index) {
                    *slot = Value::Undefined;
                }
                return Ok(true);
            }
            if key.as_str() == Some(LENGTH) {
                return Ok(false);
            }
        }
        ObjectKind::Function(_) if key.as_str() == Some("name") => return Ok(false),
        _ => {}
    }
    data.properties.shift_remove(key);
    Ok(true)
}

/// Own keys: integer keys ascending, then string keys in insertion order,
/// then symbols
pub fn own_keys(target: &ObjectRef) -> Result<Vec<PropertyKey>> {
    if let Some(proxy) = target.proxy_parts() {
        return proxy.handler.own_keys(&proxy.target);
    }
    let data = target.borrow();
    let mut indices = Vec::new();
    let mut strings = Vec::new();
    let mut symbols = Vec::new();
    if let ObjectKind::Array(elements) = &data.kind {
        indices.extend(0..elements.len());
        strings.push(PropertyKey::from(LENGTH));
    }
    for key in data.properties.keys() {
        if let Some(index) = key.as_index() {
            indices.push(index);
        } else if key.is_symbol() {
            symbols.push(key.clone());
        } else {
            strings.push(key.clone());
        }
    }
    indices.sort_unstable();
    let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::from).collect();
    keys.extend(strings);
    keys.extend(symbols);
    Ok(keys)
}

/// Prototype lookup (no trap; proxies report their target's prototype)
pub fn get_prototype_of(target: &ObjectRef) -> Option<ObjectRef> {
    match target.proxy_parts() {
        Some(proxy) => get_prototype_of(&proxy.target),
        None => target.borrow().prototype.clone(),
    }
}

pub fn is_extensible(target: &ObjectRef) -> bool {
    match target.proxy_parts() {
        Some(proxy) => is_extensible(&proxy.target),
        None => target.borrow().extensible,
    }
}

/// Forbid new own properties on `target`
pub fn prevent_extensions(target: &ObjectRef) {
    match target.proxy_parts() {
        Some(proxy) => prevent_extensions(&proxy.target),
        None => target.borrow_mut().extensible = false,
    }
}

/// `Array.isArray`: true for arrays and proxies over arrays
pub fn is_array(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => match obj.proxy_parts() {
            Some(proxy) => is_array(&Value::Object(proxy.target)),
            None => obj.is_array(),
        },
        None => false,
    }
}

/// Call a function value
pub fn call(func: &Value, this: &Value, args: &[Value]) -> Result<Value> {
    match func.as_object().and_then(ObjectRef::native_fn) {
        Some(native) => native(this, args),
        None => Err(Error::TypeError(format!("{:?} is not a function", func))),
    }
}

/// ToLength
pub fn to_length(value: &Value) -> usize {
    let n = value.to_integer_or_infinity();
    if n <= 0.0 {
        0
    } else {
        n.min(9_007_199_254_740_991.0) as usize
    }
}

// ============================================================================
// Value conveniences
// ============================================================================

fn nullish_error(value: &Value, action: &str, key: &PropertyKey) -> Error {
    Error::TypeError(format!("Cannot {} property '{}' of {:?}", action, key, value))
}

impl Value {
    /// Create a native function value
    pub fn function<F>(name: &str, f: F) -> Value
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        Value::Object(ObjectRef::new_function(name, f))
    }

    /// `self[key]`
    pub fn get(&self, key: impl Into<PropertyKey>) -> Result<Value> {
        let key = key.into();
        match self {
            Value::Object(obj) => get(obj, &key, self),
            Value::Undefined | Value::Null => Err(nullish_error(self, "read", &key)),
            _ => Ok(Value::Undefined),
        }
    }

    /// `self[key] = value`; returns whether the assignment happened
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        match self {
            Value::Object(obj) => set(obj, &key, value.into(), self),
            Value::Undefined | Value::Null => Err(nullish_error(self, "set", &key)),
            _ => Ok(false),
        }
    }

    /// `key in self`
    pub fn has(&self, key: impl Into<PropertyKey>) -> Result<bool> {
        let key = key.into();
        match self {
            Value::Object(obj) => has(obj, &key),
            _ => Err(Error::TypeError(format!(
                "Cannot use 'in' operator to search for '{}' in {:?}",
                key, self
            ))),
        }
    }

    /// `delete self[key]`
    pub fn delete(&self, key: impl Into<PropertyKey>) -> Result<bool> {
        let key = key.into();
        match self {
            Value::Object(obj) => delete_property(obj, &key),
            Value::Undefined | Value::Null => Err(nullish_error(self, "delete", &key)),
            _ => Ok(true),
        }
    }

    /// `Reflect.ownKeys(self)`
    pub fn own_keys(&self) -> Result<Vec<PropertyKey>> {
        match self {
            Value::Object(obj) => own_keys(obj),
            _ => Err(Error::TypeError(format!("{:?} is not an object", self))),
        }
    }

    /// Call `self` as a function
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        call(self, this, args)
    }

    /// `self[key](...args)`
    pub fn invoke(&self, key: impl Into<PropertyKey>, args: &[Value]) -> Result<Value> {
        let method = self.get(key)?;
        call(&method, self, args)
    }

    /// `Array.isArray(self)`
    pub fn is_array(&self) -> bool {
        is_array(self)
    }

    /// ToLength(`self.length`)
    pub fn length(&self) -> Result<usize> {
        Ok(to_length(&self.get(LENGTH)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_walks_prototype_chain() {
        let parent = Value::from(json!({ "inherited": 1 }));
        let child = ObjectRef::with_prototype(ObjectKind::Ordinary, parent.as_object().cloned());
        let child = Value::Object(child);

        assert_eq!(child.get("inherited").unwrap(), Value::from(1));
        assert!(child.has("inherited").unwrap());
        assert!(!has_own(child.as_object().unwrap(), &PropertyKey::from("inherited")));
        assert_eq!(child.get("missing").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_set_creates_on_receiver_not_prototype() {
        let parent = Value::from(json!({ "x": 1 }));
        let child = Value::Object(ObjectRef::with_prototype(
            ObjectKind::Ordinary,
            parent.as_object().cloned(),
        ));

        assert!(child.set("x", 2).unwrap());
        assert_eq!(child.get("x").unwrap(), Value::from(2));
        assert_eq!(parent.get("x").unwrap(), Value::from(1));
    }

    #[test]
    fn test_array_length_semantics() {
        let arr = Value::from(json!([1, 2, 3]));
        assert_eq!(arr.length().unwrap(), 3);

        assert!(arr.set(5usize, 6).unwrap());
        assert_eq!(arr.length().unwrap(), 6);
        assert_eq!(arr.get(4usize).unwrap(), Value::Undefined);

        assert!(arr.set("length", 2).unwrap());
        assert_eq!(arr.as_object().unwrap().array_elements(), vec![Value::from(1), Value::from(2)]);

        assert!(matches!(arr.set("length", -1), Err(Error::RangeError(_))));
        assert!(matches!(arr.set("length", 1.5), Err(Error::RangeError(_))));

        // Dense storage does not grow without bound
        assert!(!arr.set(MAX_DENSE_LENGTH, 0).unwrap());
        assert!(matches!(
            arr.set("length", (MAX_DENSE_LENGTH + 1) as f64),
            Err(Error::RangeError(_))
        ));
        assert_eq!(arr.length().unwrap(), 2);
    }

    #[test]
    fn test_array_delete_is_dense() {
        let arr = Value::from(json!([1, 2]));
        assert!(arr.delete(0usize).unwrap());
        assert_eq!(arr.length().unwrap(), 2);
        assert_eq!(arr.get(0usize).unwrap(), Value::Undefined);
        assert!(!arr.delete("length").unwrap());
    }

    #[test]
    fn test_own_keys_order() {
        let obj = Value::Object(ObjectRef::new_object());
        let sym = crate::value::Symbol::new(Some("s"));
        obj.set(sym.clone(), 0).unwrap();
        obj.set("b", 0).unwrap();
        obj.set("2", 0).unwrap();
        obj.set("a", 0).unwrap();
        obj.set("1", 0).unwrap();

        let keys = obj.own_keys().unwrap();
        assert_eq!(
            keys,
            vec![
                PropertyKey::from("1"),
                PropertyKey::from("2"),
                PropertyKey::from("b"),
                PropertyKey::from("a"),
                PropertyKey::from(sym),
            ]
        );

        let arr = Value::from(json!([true]));
        assert_eq!(arr.own_keys().unwrap(), vec![PropertyKey::from("0"), PropertyKey::from("length")]);
    }

    #[test]
    fn test_non_extensible_rejects_new_keys() {
        let obj = Value::from(json!({ "a": 1 }));
        prevent_extensions(obj.as_object().unwrap());
        assert!(!obj.set("b", 2).unwrap());
        assert!(obj.set("a", 3).unwrap());
        assert_eq!(obj.get("a").unwrap(), Value::from(3));
    }

    #[test]
    fn test_call_non_function() {
        let err = call(&Value::from(1), &Value::Undefined, &[]).unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
        assert!(matches!(Value::Undefined.get("x"), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_skip_marker_is_hidden() {
        let obj = Value::from(json!({ "a": 1 }));
        obj.as_object().unwrap().borrow_mut().skip = true;
        assert_eq!(obj.get(ReactiveFlags::Skip.as_str()).unwrap(), Value::Bool(true));
        assert_eq!(obj.own_keys().unwrap(), vec![PropertyKey::from("a")]);
    }
}
