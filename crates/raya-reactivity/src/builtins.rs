//! Native array and object methods
//!
//! The per-thread realm: `Object.prototype`, `Array.prototype` and the
//! native methods installed on them. Every array method is generic: it
//! reaches `this` only through [`reflect`](crate::reflect) operations, so
//! invoked on a wrapper it runs through the wrapper's traps, and invoked on
//! a raw array it touches nothing observable.
//!
//! Arrays are dense, so the methods do not probe for holes.

use crate::object::{FunctionData, ObjectKind, ObjectRef};
use crate::reflect;
use crate::value::{number_to_string, PropertyKey, Symbol, Value};
use crate::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

type Native = fn(&Value, &[Value]) -> Result<Value>;

/// Array methods installed on `Array.prototype`
const ARRAY_METHODS: &[(&str, Native)] = &[
    ("concat", concat),
    ("entries", entries),
    ("every", every),
    ("filter", filter),
    ("find", find),
    ("findIndex", find_index),
    ("findLast", find_last),
    ("findLastIndex", find_last_index),
    ("forEach", for_each),
    ("includes", includes),
    ("indexOf", index_of),
    ("join", join),
    ("keys", keys),
    ("lastIndexOf", last_index_of),
    ("map", map),
    ("pop", pop),
    ("push", push),
    ("reduce", reduce),
    ("reduceRight", reduce_right),
    ("shift", shift),
    ("slice", slice),
    ("some", some),
    ("splice", splice),
    ("toReversed", to_reversed),
    ("toSorted", to_sorted),
    ("toSpliced", to_spliced),
    ("unshift", unshift),
    ("values", values),
];

// ============================================================================
// Realm
// ============================================================================

struct Realm {
    object_prototype: ObjectRef,
    array_prototype: ObjectRef,
    array_intrinsics: FxHashMap<PropertyKey, ObjectRef>,
}

/// Native function object. Built without going through the realm accessors
/// so it can be used while the realm is being initialized.
fn native(name: &str, f: Native, prototype: &ObjectRef) -> ObjectRef {
    ObjectRef::with_prototype(
        ObjectKind::Function(FunctionData {
            name: Rc::from(name),
            call: Rc::new(f),
        }),
        Some(prototype.clone()),
    )
}

impl Realm {
    fn new() -> Self {
        let object_prototype = ObjectRef::with_prototype(ObjectKind::Ordinary, None);
        let has_own = native("hasOwnProperty", has_own_property, &object_prototype);
        object_prototype
            .borrow_mut()
            .properties
            .insert(PropertyKey::from("hasOwnProperty"), Value::Object(has_own));

        let array_prototype =
            ObjectRef::with_prototype(ObjectKind::Ordinary, Some(object_prototype.clone()));
        let mut array_intrinsics = FxHashMap::default();
        {
            let mut data = array_prototype.borrow_mut();
            for &(name, f) in ARRAY_METHODS {
                let func = native(name, f, &object_prototype);
                data.properties
                    .insert(PropertyKey::from(name), Value::Object(func.clone()));
                array_intrinsics.insert(PropertyKey::from(name), func);
            }
            // Array.prototype[@@iterator] is Array.prototype.values
            if let Some(values) = array_intrinsics.get(&PropertyKey::from("values")).cloned() {
                let key = PropertyKey::from(Symbol::iterator());
                data.properties.insert(key.clone(), Value::Object(values.clone()));
                array_intrinsics.insert(key, values);
            }
        }

        Self {
            object_prototype,
            array_prototype,
            array_intrinsics,
        }
    }
}

thread_local! {
    static REALM: Realm = Realm::new();
}

/// `Object.prototype` of this thread
pub fn object_prototype() -> ObjectRef {
    REALM.with(|realm| realm.object_prototype.clone())
}

/// `Array.prototype` of this thread
pub fn array_prototype() -> ObjectRef {
    REALM.with(|realm| realm.array_prototype.clone())
}

/// The built-in `Array.prototype[key]`, regardless of later overrides
pub fn array_intrinsic(key: &PropertyKey) -> Option<ObjectRef> {
    REALM.with(|realm| realm.array_intrinsics.get(key).cloned())
}

// ============================================================================
// Conversions
// ============================================================================

/// ToString
pub fn to_string(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::String(s) => s.to_string(),
        Value::Symbol(_) => {
            return Err(Error::TypeError(
                "Cannot convert a Symbol value to a string".to_string(),
            ))
        }
        Value::Object(obj) => {
            if reflect::is_array(value) {
                join_with(value, ",")?
            } else if obj.is_callable() {
                let name = value.get("name")?;
                format!("function {}() {{ [native code] }}", to_string(&name)?)
            } else {
                "[object Object]".to_string()
            }
        }
    })
}

/// ToPropertyKey
pub fn to_property_key(value: &Value) -> Result<PropertyKey> {
    match value {
        Value::Symbol(sym) => Ok(PropertyKey::from(sym.clone())),
        Value::String(s) => Ok(PropertyKey::String(s.clone())),
        other => Ok(PropertyKey::from(to_string(other)?)),
    }
}

/// Elements of an array-like, read through `get` (and therefore through any
/// traps on the way)
pub fn array_to_vec(value: &Value) -> Result<Vec<Value>> {
    let len = value.length()?;
    (0..len).map(|k| value.get(k)).collect()
}

/// Drain an iterator object
pub fn collect_iterator(iter: &Value) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    loop {
        let step = iter.invoke("next", &[])?;
        if step.get("done")?.is_truthy() {
            return Ok(items);
        }
        items.push(step.get("value")?);
    }
}

/// `[...iterable]`
pub fn iterate(iterable: &Value) -> Result<Vec<Value>> {
    let iter = iterable.invoke(Symbol::iterator(), &[])?;
    collect_iterator(&iter)
}

// ============================================================================
// Helpers
// ============================================================================

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn require_object(this: &Value, method: &str) -> Result<()> {
    if this.is_nullish() {
        return Err(Error::TypeError(format!(
            "Array.prototype.{} called on null or undefined",
            method
        )));
    }
    Ok(())
}

fn require_callable(func: &Value) -> Result<()> {
    match func.as_object() {
        Some(obj) if obj.is_callable() => Ok(()),
        _ => Err(Error::TypeError(format!("{:?} is not a function", func))),
    }
}

/// Set, failing like a strict-mode assignment
fn put(this: &Value, key: impl Into<PropertyKey>, value: Value) -> Result<()> {
    let key = key.into();
    if this.set(key.clone(), value)? {
        Ok(())
    } else {
        Err(Error::TypeError(format!(
            "Cannot assign to read only property '{}' of {:?}",
            key, this
        )))
    }
}

fn remove(this: &Value, key: impl Into<PropertyKey>) -> Result<()> {
    let key = key.into();
    if this.delete(key.clone())? {
        Ok(())
    } else {
        Err(Error::TypeError(format!(
            "Cannot delete property '{}' of {:?}",
            key, this
        )))
    }
}

/// Resolve a relative index argument against `len`
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let relative = value.to_integer_or_infinity();
    if relative < 0.0 {
        (len as f64 + relative).max(0.0) as usize
    } else {
        relative.min(len as f64) as usize
    }
}

fn callback_args(value: Value, index: usize, this: &Value) -> [Value; 3] {
    [value, Value::from(index), this.clone()]
}

fn new_array(elements: Vec<Value>) -> Value {
    Value::Object(ObjectRef::new_array(elements))
}

// ============================================================================
// Object.prototype
// ============================================================================

fn has_own_property(this: &Value, args: &[Value]) -> Result<Value> {
    let key = to_property_key(&arg(args, 0))?;
    match this.as_object() {
        Some(obj) => Ok(Value::Bool(reflect::has_own(obj, &key))),
        None => Err(Error::TypeError(
            "Cannot convert undefined or null to object".to_string(),
        )),
    }
}

// ============================================================================
// Callback methods
// ============================================================================

fn every(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "every")?;
    let (callback, this_arg) = (arg(args, 0), arg(args, 1));
    require_callable(&callback)?;
    let len = this.length()?;
    for k in 0..len {
        let value = this.get(k)?;
        if !callback.call(&this_arg, &callback_args(value, k, this))?.is_truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn some(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "some")?;
    let (callback, this_arg) = (arg(args, 0), arg(args, 1));
    require_callable(&callback)?;
    let len = this.length()?;
    for k in 0..len {
        let value = this.get(k)?;
        if callback.call(&this_arg, &callback_args(value, k, this))?.is_truthy() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn filter(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "filter")?;
    let (callback, this_arg) = (arg(args, 0), arg(args, 1));
    require_callable(&callback)?;
    let len = this.length()?;
    let mut selected = Vec::new();
    for k in 0..len {
        let value = this.get(k)?;
        if callback
            .call(&this_arg, &callback_args(value.clone(), k, this))?
            .is_truthy()
        {
            selected.push(value);
        }
    }
    Ok(new_array(selected))
}

fn map(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "map")?;
    let (callback, this_arg) = (arg(args, 0), arg(args, 1));
    require_callable(&callback)?;
    let len = this.length()?;
    let mut mapped = Vec::with_capacity(len);
    for k in 0..len {
        let value = this.get(k)?;
        mapped.push(callback.call(&this_arg, &callback_args(value, k, this))?);
    }
    Ok(new_array(mapped))
}

fn for_each(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "forEach")?;
    let (callback, this_arg) = (arg(args, 0), arg(args, 1));
    require_callable(&callback)?;
    let len = this.length()?;
    for k in 0..len {
        let value = this.get(k)?;
        callback.call(&this_arg, &callback_args(value, k, this))?;
    }
    Ok(Value::Undefined)
}

/// Shared body of find / findIndex / findLast / findLastIndex
fn find_by(this: &Value, args: &[Value], method: &str, reverse: bool) -> Result<Option<(usize, Value)>> {
    require_object(this, method)?;
    let (callback, this_arg) = (arg(args, 0), arg(args, 1));
    require_callable(&callback)?;
    let len = this.length()?;
    let indices: Box<dyn Iterator<Item = usize>> = if reverse {
        Box::new((0..len).rev())
    } else {
        Box::new(0..len)
    };
    for k in indices {
        let value = this.get(k)?;
        if callback
            .call(&this_arg, &callback_args(value.clone(), k, this))?
            .is_truthy()
        {
            return Ok(Some((k, value)));
        }
    }
    Ok(None)
}

fn found_value(found: Option<(usize, Value)>) -> Value {
    found.map(|(_, value)| value).unwrap_or_default()
}

fn found_index(found: Option<(usize, Value)>) -> Value {
    found
        .map(|(k, _)| Value::from(k))
        .unwrap_or(Value::Number(-1.0))
}

fn find(this: &Value, args: &[Value]) -> Result<Value> {
    find_by(this, args, "find", false).map(found_value)
}

fn find_index(this: &Value, args: &[Value]) -> Result<Value> {
    find_by(this, args, "findIndex", false).map(found_index)
}

fn find_last(this: &Value, args: &[Value]) -> Result<Value> {
    find_by(this, args, "findLast", true).map(found_value)
}

fn find_last_index(this: &Value, args: &[Value]) -> Result<Value> {
    find_by(this, args, "findLastIndex", true).map(found_index)
}

fn reduce_by(this: &Value, args: &[Value], method: &str, reverse: bool) -> Result<Value> {
    require_object(this, method)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let len = this.length()?;
    let mut indices: Box<dyn Iterator<Item = usize>> = if reverse {
        Box::new((0..len).rev())
    } else {
        Box::new(0..len)
    };
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match indices.next() {
            Some(k) => this.get(k)?,
            None => {
                return Err(Error::TypeError(
                    "Reduce of empty array with no initial value".to_string(),
                ))
            }
        },
    };
    for k in indices {
        let value = this.get(k)?;
        acc = callback.call(
            &Value::Undefined,
            &[acc, value, Value::from(k), this.clone()],
        )?;
    }
    Ok(acc)
}

fn reduce(this: &Value, args: &[Value]) -> Result<Value> {
    reduce_by(this, args, "reduce", false)
}

fn reduce_right(this: &Value, args: &[Value]) -> Result<Value> {
    reduce_by(this, args, "reduceRight", true)
}

// ============================================================================
// Search methods
// ============================================================================

fn includes(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "includes")?;
    let search = arg(args, 0);
    let len = this.length()?;
    let start = relative_index(&arg(args, 1), len, 0);
    for k in start..len {
        if this.get(k)?.same_value_zero(&search) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn index_of(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "indexOf")?;
    let search = arg(args, 0);
    let len = this.length()?;
    let start = relative_index(&arg(args, 1), len, 0);
    for k in start..len {
        if this.get(k)?.strict_equals(&search) {
            return Ok(Value::from(k));
        }
    }
    Ok(Value::Number(-1.0))
}

fn last_index_of(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "lastIndexOf")?;
    let search = arg(args, 0);
    let len = this.length()?;
    if len == 0 {
        return Ok(Value::Number(-1.0));
    }
    let from = match args.get(1) {
        None => len as f64 - 1.0,
        Some(value) => {
            let n = value.to_integer_or_infinity();
            if n >= 0.0 {
                n.min(len as f64 - 1.0)
            } else {
                len as f64 + n
            }
        }
    };
    if from < 0.0 {
        return Ok(Value::Number(-1.0));
    }
    for k in (0..=from as usize).rev() {
        if this.get(k)?.strict_equals(&search) {
            return Ok(Value::from(k));
        }
    }
    Ok(Value::Number(-1.0))
}

// ============================================================================
// Length-mutating methods
// ============================================================================

fn push(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "push")?;
    let len = this.length()?;
    if len + args.len() > reflect::MAX_ARRAY_LENGTH {
        return Err(Error::TypeError("Pushing items exceeds the maximum array length".to_string()));
    }
    for (i, item) in args.iter().enumerate() {
        put(this, len + i, item.clone())?;
    }
    let new_len = len + args.len();
    put(this, "length", Value::from(new_len))?;
    Ok(Value::from(new_len))
}

fn pop(this: &Value, _args: &[Value]) -> Result<Value> {
    require_object(this, "pop")?;
    let len = this.length()?;
    if len == 0 {
        put(this, "length", Value::from(0usize))?;
        return Ok(Value::Undefined);
    }
    let index = len - 1;
    let element = this.get(index)?;
    remove(this, index)?;
    put(this, "length", Value::from(index))?;
    Ok(element)
}

fn shift(this: &Value, _args: &[Value]) -> Result<Value> {
    require_object(this, "shift")?;
    let len = this.length()?;
    if len == 0 {
        put(this, "length", Value::from(0usize))?;
        return Ok(Value::Undefined);
    }
    let first = this.get(0usize)?;
    for k in 1..len {
        let value = this.get(k)?;
        put(this, k - 1, value)?;
    }
    remove(this, len - 1)?;
    put(this, "length", Value::from(len - 1))?;
    Ok(first)
}

fn unshift(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "unshift")?;
    let len = this.length()?;
    let count = args.len();
    if count > 0 {
        for k in (1..=len).rev() {
            let value = this.get(k - 1)?;
            put(this, k + count - 1, value)?;
        }
        for (j, item) in args.iter().enumerate() {
            put(this, j, item.clone())?;
        }
    }
    put(this, "length", Value::from(len + count))?;
    Ok(Value::from(len + count))
}

/// Start index and removal count of a splice-style argument list
fn splice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let start = relative_index(&arg(args, 0), len, 0);
    let count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let n = args[1].to_integer_or_infinity();
            n.max(0.0).min((len - start) as f64) as usize
        }
    };
    (start, count)
}

fn splice(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "splice")?;
    let len = this.length()?;
    let (start, delete_count) = splice_bounds(args, len);
    let items = args.get(2..).unwrap_or(&[]);
    let item_count = items.len();

    let mut removed = Vec::with_capacity(delete_count);
    for k in 0..delete_count {
        removed.push(this.get(start + k)?);
    }

    if item_count < delete_count {
        for k in start..len - delete_count {
            let value = this.get(k + delete_count)?;
            put(this, k + item_count, value)?;
        }
        for k in ((len - delete_count + item_count)..len).rev() {
            remove(this, k)?;
        }
    } else if item_count > delete_count {
        for k in ((start + 1)..=(len - delete_count)).rev() {
            let value = this.get(k + delete_count - 1)?;
            put(this, k + item_count - 1, value)?;
        }
    }
    for (i, item) in items.iter().enumerate() {
        put(this, start + i, item.clone())?;
    }
    put(this, "length", Value::from(len - delete_count + item_count))?;
    Ok(new_array(removed))
}

// ============================================================================
// Copying methods
// ============================================================================

fn concat(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "concat")?;
    let mut elements = Vec::new();
    for item in std::iter::once(this).chain(args.iter()) {
        if reflect::is_array(item) {
            elements.extend(array_to_vec(item)?);
        } else {
            elements.push(item.clone());
        }
    }
    Ok(new_array(elements))
}

thread_local! {
    /// Arrays currently being joined; a nested join of one of them is ""
    static JOIN_STACK: RefCell<FxHashSet<usize>> = RefCell::new(FxHashSet::default());
}

/// Membership in [`JOIN_STACK`] for the duration of one join
struct JoinGuard(usize);

impl JoinGuard {
    fn enter(this: &Value) -> Option<Self> {
        let id = this.as_object()?.id();
        JOIN_STACK
            .with(|stack| stack.borrow_mut().insert(id))
            .then_some(JoinGuard(id))
    }
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        JOIN_STACK.with(|stack| stack.borrow_mut().remove(&self.0));
    }
}

fn join_with(this: &Value, separator: &str) -> Result<String> {
    let Some(_guard) = JoinGuard::enter(this) else {
        return Ok(String::new());
    };
    let len = this.length()?;
    let mut parts = Vec::with_capacity(len);
    for k in 0..len {
        let element = this.get(k)?;
        parts.push(if element.is_nullish() {
            String::new()
        } else {
            to_string(&element)?
        });
    }
    Ok(parts.join(separator))
}

fn join(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "join")?;
    let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(sep) => to_string(sep)?,
    };
    Ok(Value::string(join_with(this, &separator)?))
}

fn slice(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "slice")?;
    let len = this.length()?;
    let start = relative_index(&arg(args, 0), len, 0);
    let end = relative_index(&arg(args, 1), len, len);
    let mut elements = Vec::new();
    for k in start..end.max(start) {
        elements.push(this.get(k)?);
    }
    Ok(new_array(elements))
}

fn to_reversed(this: &Value, _args: &[Value]) -> Result<Value> {
    require_object(this, "toReversed")?;
    let mut elements = array_to_vec(this)?;
    elements.reverse();
    Ok(new_array(elements))
}

/// Stable merge sort with a fallible comparator
fn merge_sort(
    mut items: Vec<Value>,
    compare: &mut dyn FnMut(&Value, &Value) -> Result<Ordering>,
) -> Result<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => compare(b, a)? == Ordering::Less,
            _ => break,
        };
        if take_right {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn to_sorted(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "toSorted")?;
    let comparer = arg(args, 0);
    if !comparer.is_undefined() {
        require_callable(&comparer)?;
    }
    let (defined, undefined): (Vec<Value>, Vec<Value>) = array_to_vec(this)?
        .into_iter()
        .partition(|value| !value.is_undefined());

    let mut compare = |a: &Value, b: &Value| -> Result<Ordering> {
        if comparer.is_undefined() {
            return Ok(to_string(a)?.cmp(&to_string(b)?));
        }
        let n = comparer.call(&Value::Undefined, &[a.clone(), b.clone()])?.to_number();
        Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
    };
    let mut sorted = merge_sort(defined, &mut compare)?;
    sorted.extend(undefined);
    Ok(new_array(sorted))
}

fn to_spliced(this: &Value, args: &[Value]) -> Result<Value> {
    require_object(this, "toSpliced")?;
    let len = this.length()?;
    let (start, skip_count) = splice_bounds(args, len);
    let items = args.get(2..).unwrap_or(&[]);

    let mut elements = Vec::with_capacity(len - skip_count + items.len());
    for k in 0..start {
        elements.push(this.get(k)?);
    }
    elements.extend(items.iter().cloned());
    for k in (start + skip_count)..len {
        elements.push(this.get(k)?);
    }
    Ok(new_array(elements))
}

// ============================================================================
// Iterators
// ============================================================================

#[derive(Clone, Copy)]
enum IterKind {
    Keys,
    Values,
    Entries,
}

/// `{ value, done }`
fn iter_result(value: Value, done: bool) -> Value {
    let result = ObjectRef::new_object();
    {
        let mut data = result.borrow_mut();
        data.properties.insert(PropertyKey::from("value"), value);
        data.properties.insert(PropertyKey::from("done"), Value::Bool(done));
    }
    Value::Object(result)
}

/// Array iterator: an ordinary object with a `next` method. Length and
/// elements are read when `next` is called, not when the iterator is made.
fn array_iterator(this: &Value, kind: IterKind) -> Value {
    let array = this.clone();
    let position = Cell::new(0usize);
    let next = ObjectRef::new_function("next", move |_this, _args| {
        let index = position.get();
        if index >= array.length()? {
            position.set(usize::MAX);
            return Ok(iter_result(Value::Undefined, true));
        }
        position.set(index + 1);
        let value = match kind {
            IterKind::Keys => Value::from(index),
            IterKind::Values => array.get(index)?,
            IterKind::Entries => new_array(vec![Value::from(index), array.get(index)?]),
        };
        Ok(iter_result(value, false))
    });
    let self_iterator = ObjectRef::new_function("[Symbol.iterator]", |this, _args| Ok(this.clone()));

    let iter = ObjectRef::new_object();
    {
        let mut data = iter.borrow_mut();
        data.properties.insert(PropertyKey::from("next"), Value::Object(next));
        data.properties.insert(
            PropertyKey::from(Symbol::iterator()),
            Value::Object(self_iterator),
        );
    }
    Value::Object(iter)
}

fn keys(this: &Value, _args: &[Value]) -> Result<Value> {
    require_object(this, "keys")?;
    Ok(array_iterator(this, IterKind::Keys))
}

fn values(this: &Value, _args: &[Value]) -> Result<Value> {
    require_object(this, "values")?;
    Ok(array_iterator(this, IterKind::Values))
}

fn entries(this: &Value, _args: &[Value]) -> Result<Value> {
    require_object(this, "entries")?;
    Ok(array_iterator(this, IterKind::Entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arr(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn numbers(value: &Value) -> Vec<f64> {
        array_to_vec(value)
            .unwrap()
            .iter()
            .map(|v| v.as_number().unwrap_or(f64::NAN))
            .collect()
    }

    #[test]
    fn test_prototypes() {
        let a = arr(json!([1]));
        let proto = reflect::get_prototype_of(a.as_object().unwrap()).unwrap();
        assert!(proto.ptr_eq(&array_prototype()));
        assert!(reflect::get_prototype_of(&proto).unwrap().ptr_eq(&object_prototype()));

        let values = array_intrinsic(&PropertyKey::from("values")).unwrap();
        let iter = array_intrinsic(&PropertyKey::from(Symbol::iterator())).unwrap();
        assert!(values.ptr_eq(&iter));
        assert_eq!(a.get("push").unwrap(), Value::Object(array_intrinsic(&"push".into()).unwrap()));
    }

    #[test]
    fn test_has_own_property() {
        let obj = arr(json!({ "a": 1 }));
        assert_eq!(obj.invoke("hasOwnProperty", &[Value::from("a")]).unwrap(), Value::Bool(true));
        assert_eq!(
            obj.invoke("hasOwnProperty", &[Value::from("hasOwnProperty")]).unwrap(),
            Value::Bool(false)
        );
        let a = arr(json!([1]));
        assert_eq!(a.invoke("hasOwnProperty", &[Value::from(0)]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_callback_methods() {
        let a = arr(json!([1, 2, 3, 4]));
        let even = Value::function("even", |_, args| {
            Ok(Value::Bool(args[0].to_number() % 2.0 == 0.0))
        });
        let double = Value::function("double", |_, args| Ok(Value::from(args[0].to_number() * 2.0)));

        assert_eq!(numbers(&a.invoke("filter", &[even.clone()]).unwrap()), vec![2.0, 4.0]);
        assert_eq!(numbers(&a.invoke("map", &[double]).unwrap()), vec![2.0, 4.0, 6.0, 8.0]);
        assert_eq!(a.invoke("find", &[even.clone()]).unwrap(), Value::from(2));
        assert_eq!(a.invoke("findIndex", &[even.clone()]).unwrap(), Value::from(1));
        assert_eq!(a.invoke("findLast", &[even.clone()]).unwrap(), Value::from(4));
        assert_eq!(a.invoke("findLastIndex", &[even.clone()]).unwrap(), Value::from(3));
        assert_eq!(a.invoke("some", &[even.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(a.invoke("every", &[even]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_callback_receives_this_arg_and_array() {
        let a = arr(json!([1]));
        let ctx = arr(json!({}));
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        let callback = Value::function("cb", move |this, args| {
            sink.borrow_mut().push((this.clone(), args[2].clone()));
            Ok(Value::Undefined)
        });
        a.invoke("forEach", &[callback, ctx.clone()]).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen[0].0, ctx);
        assert_eq!(seen[0].1, a);
    }

    #[test]
    fn test_reduce() {
        let a = arr(json!(["a", "b", "c"]));
        let cat = Value::function("cat", |_, args| {
            Ok(Value::string(format!("{}{}", to_string(&args[0])?, to_string(&args[1])?)))
        });
        assert_eq!(a.invoke("reduce", &[cat.clone()]).unwrap(), Value::from("abc"));
        assert_eq!(a.invoke("reduceRight", &[cat.clone(), Value::from(">")]).unwrap(), Value::from(">cba"));

        let empty = arr(json!([]));
        assert!(matches!(empty.invoke("reduce", &[cat]), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_search() {
        let a = arr(json!([1, 2, 1, null]));
        assert_eq!(a.invoke("indexOf", &[Value::from(1)]).unwrap(), Value::from(0));
        assert_eq!(a.invoke("indexOf", &[Value::from(1), Value::from(1)]).unwrap(), Value::from(2));
        assert_eq!(a.invoke("lastIndexOf", &[Value::from(1)]).unwrap(), Value::from(2));
        assert_eq!(a.invoke("lastIndexOf", &[Value::from(1), Value::from(-3)]).unwrap(), Value::from(0));
        assert_eq!(a.invoke("indexOf", &[Value::from(9)]).unwrap(), Value::Number(-1.0));
        assert_eq!(a.invoke("includes", &[Value::Null]).unwrap(), Value::Bool(true));

        let nan = arr(json!([]));
        nan.invoke("push", &[Value::Number(f64::NAN)]).unwrap();
        assert_eq!(nan.invoke("includes", &[Value::Number(f64::NAN)]).unwrap(), Value::Bool(true));
        assert_eq!(nan.invoke("indexOf", &[Value::Number(f64::NAN)]).unwrap(), Value::Number(-1.0));
    }

    #[test]
    fn test_mutators() {
        let a = arr(json!([1, 2, 3]));
        assert_eq!(a.invoke("push", &[Value::from(4), Value::from(5)]).unwrap(), Value::from(5));
        assert_eq!(a.invoke("pop", &[]).unwrap(), Value::from(5));
        assert_eq!(a.invoke("shift", &[]).unwrap(), Value::from(1));
        assert_eq!(a.invoke("unshift", &[Value::from(0)]).unwrap(), Value::from(4));
        assert_eq!(numbers(&a), vec![0.0, 2.0, 3.0, 4.0]);

        let removed = a
            .invoke("splice", &[Value::from(1), Value::from(2), Value::from(9)])
            .unwrap();
        assert_eq!(numbers(&removed), vec![2.0, 3.0]);
        assert_eq!(numbers(&a), vec![0.0, 9.0, 4.0]);

        a.invoke("splice", &[Value::from(1), Value::from(0), Value::from(7), Value::from(8)])
            .unwrap();
        assert_eq!(numbers(&a), vec![0.0, 7.0, 8.0, 9.0, 4.0]);

        let tail = a.invoke("splice", &[Value::from(-2)]).unwrap();
        assert_eq!(numbers(&tail), vec![9.0, 4.0]);
        assert_eq!(numbers(&a), vec![0.0, 7.0, 8.0]);

        let empty = arr(json!([]));
        assert_eq!(empty.invoke("pop", &[]).unwrap(), Value::Undefined);
        assert_eq!(empty.invoke("shift", &[]).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_copying_methods() {
        let a = arr(json!([3, 1, 2]));
        assert_eq!(numbers(&a.invoke("slice", &[Value::from(1)]).unwrap()), vec![1.0, 2.0]);
        assert_eq!(numbers(&a.invoke("toReversed", &[]).unwrap()), vec![2.0, 1.0, 3.0]);
        assert_eq!(numbers(&a.invoke("toSorted", &[]).unwrap()), vec![1.0, 2.0, 3.0]);
        let desc = Value::function("desc", |_, args| {
            Ok(Value::from(args[1].to_number() - args[0].to_number()))
        });
        assert_eq!(numbers(&a.invoke("toSorted", &[desc]).unwrap()), vec![3.0, 2.0, 1.0]);
        assert_eq!(
            numbers(&a.invoke("toSpliced", &[Value::from(0), Value::from(1), Value::from(5)]).unwrap()),
            vec![5.0, 1.0, 2.0]
        );
        // Originals untouched.
        assert_eq!(numbers(&a), vec![3.0, 1.0, 2.0]);

        let joined = a.invoke("concat", &[arr(json!([4])), Value::from(5)]).unwrap();
        assert_eq!(numbers(&joined), vec![3.0, 1.0, 2.0, 4.0, 5.0]);
        assert_eq!(a.invoke("join", &[]).unwrap(), Value::from("3,1,2"));
        assert_eq!(arr(json!([1, null, "x"])).invoke("join", &[Value::from("-")]).unwrap(), Value::from("1--x"));
    }

    #[test]
    fn test_default_sort_is_lexicographic() {
        let a = arr(json!([10, 9, 1]));
        assert_eq!(numbers(&a.invoke("toSorted", &[]).unwrap()), vec![1.0, 10.0, 9.0]);
    }

    #[test]
    fn test_comparator_error_propagates() {
        let a = arr(json!([2, 1]));
        let boom = Value::function("boom", |_, _| Err(Error::Thrown(Value::from("boom"))));
        assert!(matches!(a.invoke("toSorted", &[boom]), Err(Error::Thrown(_))));
    }

    #[test]
    fn test_iterators() {
        let a = arr(json!(["x", "y"]));
        assert_eq!(iterate(&a).unwrap(), vec![Value::from("x"), Value::from("y")]);
        let keys = collect_iterator(&a.invoke("keys", &[]).unwrap()).unwrap();
        assert_eq!(keys, vec![Value::from(0), Value::from(1)]);
        let entries = collect_iterator(&a.invoke("entries", &[]).unwrap()).unwrap();
        assert_eq!(entries[1].get(0usize).unwrap(), Value::from(1));
        assert_eq!(entries[1].get(1usize).unwrap(), Value::from("y"));
    }

    #[test]
    fn test_iterator_reads_lazily() {
        let a = arr(json!([1]));
        let iter = a.invoke("values", &[]).unwrap();
        a.invoke("push", &[Value::from(2)]).unwrap();
        assert_eq!(collect_iterator(&iter).unwrap(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(to_string(&Value::from(1.5)).unwrap(), "1.5");
        assert_eq!(to_string(&arr(json!([1, [2, 3]]))).unwrap(), "1,2,3");
        assert_eq!(to_string(&arr(json!({}))).unwrap(), "[object Object]");
        assert!(to_string(&Value::Symbol(Symbol::iterator())).is_err());
    }

    #[test]
    fn test_join_of_cyclic_array() {
        let a = arr(json!([1, 2]));
        a.set(2usize, a.clone()).unwrap();
        assert_eq!(a.invoke("join", &[]).unwrap(), Value::from("1,2,"));
        assert_eq!(to_string(&a).unwrap(), "1,2,");

        // Reaching the same array twice without a cycle is not a cycle
        let inner = arr(json!([3]));
        let outer = Value::Object(ObjectRef::new_array(vec![inner.clone(), inner]));
        assert_eq!(to_string(&outer).unwrap(), "3,3");

        let failing = arr(json!([]));
        failing.set(0usize, Value::Symbol(Symbol::iterator())).unwrap();
        assert!(failing.invoke("join", &[]).is_err());
        // The failed join released its entry
        failing.set(0usize, 5).unwrap();
        assert_eq!(failing.invoke("join", &[]).unwrap(), Value::from("5"));
    }
}
