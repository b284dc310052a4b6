//! Array method instrumentation
//!
//! Mutable array wrappers hand out these replacements instead of the native
//! `Array.prototype` methods. Intercepting a bulk operation element by
//! element would record one dependency per index and hand identity-sensitive
//! methods wrapped elements; the replacements instead run the native method
//! on the raw array and record a single whole-array dependency.
//!
//! ## Strategies
//!
//! - **whole-array reads** (`concat`, `join`, `toReversed`, `toSorted`,
//!   `toSpliced`): operate on [`reactive_read_array`].
//! - **callback traversal** (`every`, `filter`, `find`, `findIndex`,
//!   `findLast`, `findLastIndex`, `forEach`, `map`, `some`): the callback
//!   sees wrapped elements and the wrapper as its `array` argument.
//! - **reducers** (`reduce`, `reduceRight`): same, accumulator first.
//! - **iterators** (`values`, `entries`, `@@iterator`): the dependency is
//!   recorded once when the iterator is created; yielded values are wrapped
//!   per step.
//! - **search** (`includes`, `indexOf`, `lastIndexOf`): a miss with a
//!   wrapped argument is retried with its raw form.
//! - **length-mutating** (`push`, `pop`, `shift`, `unshift`, `splice`):
//!   run with tracking paused inside a batch.
//!
//! `keys` only reads `length` and `slice` would need range tracking; both
//! are left to the native methods.

use crate::builtins;
use crate::dep::{self, BatchScope, DepKey, TrackOp, TrackingPaused};
use crate::reactive::{is_proxy, is_shallow, to_raw, to_reactive};
use crate::reflect;
use crate::value::{PropertyKey, Symbol, Value};
use crate::Result;
use rustc_hash::FxHashMap;

type Instrumented = fn(&Value, &[Value]) -> Result<Value>;

const INSTRUMENTED: &[(&str, Instrumented)] = &[
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
    ("lastIndexOf", last_index_of),
    ("map", map),
    ("pop", pop),
    ("push", push),
    ("reduce", reduce),
    ("reduceRight", reduce_right),
    ("shift", shift),
    ("some", some),
    ("splice", splice),
    ("toReversed", to_reversed),
    ("toSorted", to_sorted),
    ("toSpliced", to_spliced),
    ("unshift", unshift),
    ("values", values),
];

fn build_table() -> FxHashMap<PropertyKey, Value> {
    let mut table: FxHashMap<PropertyKey, Value> = INSTRUMENTED
        .iter()
        .map(|&(name, f)| (PropertyKey::from(name), Value::function(name, f)))
        .collect();
    table.insert(
        PropertyKey::from(Symbol::iterator()),
        Value::function("[Symbol.iterator]", default_iterator),
    );
    table
}

thread_local! {
    static TABLE: FxHashMap<PropertyKey, Value> = build_table();
}

/// Replacement for `Array.prototype[key]`, if the method is instrumented
pub fn lookup(key: &PropertyKey) -> Option<Value> {
    TABLE.with(|table| table.get(key).cloned())
}

/// Whether `key` names an instrumented method
pub fn is_instrumented(key: &PropertyKey) -> bool {
    TABLE.with(|table| table.contains_key(key))
}

// ============================================================================
// Read helpers
// ============================================================================

fn track_array_iterate(raw: &Value) {
    if let Some(obj) = raw.as_object() {
        dep::track(obj, TrackOp::Iterate, DepKey::ArrayIterate);
    }
}

/// Whole-array read
///
/// For a deep wrapper: track one whole-array dependency on the raw array
/// and return a fresh array of wrapped elements. For a shallow wrapper: the
/// raw array (still tracked). For anything else: the input, untracked.
pub fn reactive_read_array(array: &Value) -> Result<Value> {
    let raw = to_raw(array);
    if raw == *array {
        return Ok(raw);
    }
    track_array_iterate(&raw);
    if is_shallow(array) {
        return Ok(raw);
    }
    let wrapped = builtins::array_to_vec(&raw)?
        .iter()
        .map(to_reactive)
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Object(crate::object::ObjectRef::new_array(wrapped)))
}

/// Track one whole-array dependency and return the raw array
pub fn shallow_read_array(array: &Value) -> Value {
    let raw = to_raw(array);
    track_array_iterate(&raw);
    raw
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn is_callable(value: &Value) -> bool {
    value.as_object().map(|obj| obj.is_callable()).unwrap_or(false)
}

/// Whether `method` is the built-in `Array.prototype[name]`
fn is_native_method(method: &Value, name: &str) -> bool {
    match (method, builtins::array_intrinsic(&PropertyKey::from(name))) {
        (Value::Object(obj), Some(native)) => obj.ptr_eq(&native),
        _ => false,
    }
}

// ============================================================================
// Callback traversal
// ============================================================================

/// Post-processing of a traversal result on a deep wrapper
#[derive(Clone, Copy)]
enum ResultWrap {
    /// Wrap every element of the returned array (`filter`)
    Each,
    /// Wrap the returned element (`find`, `findLast`)
    Single,
}

fn apply(this: &Value, method: &str, args: &[Value], wrap: Option<ResultWrap>) -> Result<Value> {
    let arr = shallow_read_array(this);
    let needs_wrap = arr != *this && !is_shallow(this);
    let method_fn = arr.get(method)?;

    // A user-supplied method has an unknown argument contract: call it as
    // it was asked to be called.
    if !is_native_method(&method_fn, method) {
        tracing::trace!(target: "raya_reactivity", method, "array method overridden, skipping instrumentation");
        let result = method_fn.call(this, args)?;
        return if needs_wrap { to_reactive(&result) } else { Ok(result) };
    }

    let callback = arg(args, 0);
    let this_arg = arg(args, 1);
    let wrapped = if arr != *this && is_callable(&callback) {
        let receiver = this.clone();
        Value::function(method, move |cb_this, cb_args| {
            let item = arg(cb_args, 0);
            let item = if needs_wrap { to_reactive(&item)? } else { item };
            callback.call(cb_this, &[item, arg(cb_args, 1), receiver.clone()])
        })
    } else {
        callback
    };

    let result = method_fn.call(&arr, &[wrapped, this_arg])?;
    match wrap {
        Some(ResultWrap::Each) if needs_wrap => {
            let wrapped = builtins::array_to_vec(&result)?
                .iter()
                .map(to_reactive)
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Object(crate::object::ObjectRef::new_array(wrapped)))
        }
        Some(ResultWrap::Single) if needs_wrap => to_reactive(&result),
        _ => Ok(result),
    }
}

fn every(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "every", args, None)
}

fn filter(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "filter", args, Some(ResultWrap::Each))
}

fn find(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "find", args, Some(ResultWrap::Single))
}

fn find_index(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "findIndex", args, None)
}

fn find_last(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "findLast", args, Some(ResultWrap::Single))
}

fn find_last_index(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "findLastIndex", args, None)
}

fn for_each(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "forEach", args, None)
}

fn map(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "map", args, None)
}

fn some(this: &Value, args: &[Value]) -> Result<Value> {
    apply(this, "some", args, None)
}

// ============================================================================
// Reducers
// ============================================================================

fn reduce_with(this: &Value, method: &str, args: &[Value]) -> Result<Value> {
    let arr = shallow_read_array(this);
    let callback = arg(args, 0);
    let wrapped = if arr != *this && is_callable(&callback) {
        let deep = !is_shallow(this);
        let receiver = this.clone();
        Value::function(method, move |cb_this, cb_args| {
            let item = arg(cb_args, 1);
            let item = if deep { to_reactive(&item)? } else { item };
            callback.call(
                cb_this,
                &[arg(cb_args, 0), item, arg(cb_args, 2), receiver.clone()],
            )
        })
    } else {
        callback
    };

    let mut call_args = Vec::with_capacity(args.len().max(1));
    call_args.push(wrapped);
    call_args.extend(args.iter().skip(1).cloned());
    arr.invoke(method, &call_args)
}

fn reduce(this: &Value, args: &[Value]) -> Result<Value> {
    reduce_with(this, "reduce", args)
}

fn reduce_right(this: &Value, args: &[Value]) -> Result<Value> {
    reduce_with(this, "reduceRight", args)
}

// ============================================================================
// Iterators
// ============================================================================

#[derive(Clone, Copy)]
enum StepWrap {
    /// Wrap the yielded value
    Value,
    /// Wrap the value half of a `[index, value]` pair
    Entry,
}

fn wrap_step(value: Value, wrap: StepWrap) -> Result<Value> {
    match wrap {
        StepWrap::Value => to_reactive(&value),
        StepWrap::Entry => {
            let element = value.get(1usize)?;
            value.set(1usize, to_reactive(&element)?)?;
            Ok(value)
        }
    }
}

/// Native iterator over the raw array, with `next` replaced so yielded
/// values are wrapped as they are produced
fn iterator(this: &Value, method: PropertyKey, wrap: StepWrap) -> Result<Value> {
    let arr = shallow_read_array(this);
    let iter = arr.invoke(method, &[])?;

    if arr != *this && !is_shallow(this) {
        if let Some(iter_obj) = iter.as_object() {
            let native_next = iter.get("next")?;
            // Weak: the iterator owns this function
            let iter_ref = iter_obj.downgrade();
            let next = Value::function("next", move |_this, _args| {
                let current = iter_ref.upgrade().map(Value::Object).unwrap_or_default();
                let step = native_next.call(&current, &[])?;
                let value = step.get("value")?;
                if value.is_truthy() {
                    step.set("value", wrap_step(value, wrap)?)?;
                }
                Ok(step)
            });
            iter.set("next", next)?;
        }
    }
    Ok(iter)
}

fn values(this: &Value, _args: &[Value]) -> Result<Value> {
    iterator(this, PropertyKey::from("values"), StepWrap::Value)
}

fn entries(this: &Value, _args: &[Value]) -> Result<Value> {
    iterator(this, PropertyKey::from("entries"), StepWrap::Entry)
}

fn default_iterator(this: &Value, _args: &[Value]) -> Result<Value> {
    iterator(this, PropertyKey::from(Symbol::iterator()), StepWrap::Value)
}

// ============================================================================
// Identity-sensitive search
// ============================================================================

fn search(this: &Value, method: &str, args: &[Value]) -> Result<Value> {
    let arr = to_raw(this);
    track_array_iterate(&arr);
    let res = arr.invoke(method, args)?;

    // The array may hold the raw form of a wrapped argument
    let missed = res == Value::Number(-1.0) || res == Value::Bool(false);
    if missed && is_proxy(&arg(args, 0)) {
        let mut retry = args.to_vec();
        retry[0] = to_raw(&retry[0]);
        return arr.invoke(method, &retry);
    }
    Ok(res)
}

fn includes(this: &Value, args: &[Value]) -> Result<Value> {
    search(this, "includes", args)
}

fn index_of(this: &Value, args: &[Value]) -> Result<Value> {
    search(this, "indexOf", args)
}

fn last_index_of(this: &Value, args: &[Value]) -> Result<Value> {
    search(this, "lastIndexOf", args)
}

// ============================================================================
// Length-mutating methods
// ============================================================================

/// Run the raw array's method against the wrapper with tracking paused,
/// delivering its triggers as one batch
fn no_tracking(this: &Value, method: &str, args: &[Value]) -> Result<Value> {
    let _paused = TrackingPaused::new();
    let _batch = BatchScope::new();
    let method_fn = to_raw(this).get(method)?;
    method_fn.call(this, args)
}

fn push(this: &Value, args: &[Value]) -> Result<Value> {
    no_tracking(this, "push", args)
}

fn pop(this: &Value, _args: &[Value]) -> Result<Value> {
    no_tracking(this, "pop", &[])
}

fn shift(this: &Value, _args: &[Value]) -> Result<Value> {
    no_tracking(this, "shift", &[])
}

fn unshift(this: &Value, args: &[Value]) -> Result<Value> {
    no_tracking(this, "unshift", args)
}

fn splice(this: &Value, args: &[Value]) -> Result<Value> {
    no_tracking(this, "splice", args)
}

// ============================================================================
// Whole-array reads
// ============================================================================

fn concat(this: &Value, args: &[Value]) -> Result<Value> {
    let arr = reactive_read_array(this)?;
    let items = args
        .iter()
        .map(|item| {
            if reflect::is_array(item) {
                reactive_read_array(item)
            } else {
                Ok(item.clone())
            }
        })
        .collect::<Result<Vec<_>>>()?;
    arr.invoke("concat", &items)
}

fn join(this: &Value, args: &[Value]) -> Result<Value> {
    reactive_read_array(this)?.invoke("join", &args[..args.len().min(1)])
}

fn to_reversed(this: &Value, _args: &[Value]) -> Result<Value> {
    reactive_read_array(this)?.invoke("toReversed", &[])
}

fn to_sorted(this: &Value, args: &[Value]) -> Result<Value> {
    reactive_read_array(this)?.invoke("toSorted", &args[..args.len().min(1)])
}

fn to_spliced(this: &Value, args: &[Value]) -> Result<Value> {
    reactive_read_array(this)?.invoke("toSpliced", args)
}
