//! Host values and property keys
//!
//! Primitives are stored inline; objects (plain objects, arrays, functions,
//! boxes and proxies) are reference types compared by identity.
//!
//! # Equality
//!
//! Three comparisons are exposed because the array methods and the write
//! path need different ones:
//! - [`Value::strict_equals`]: `indexOf` / `lastIndexOf` (`NaN` never matches)
//! - [`Value::same_value_zero`]: `includes` (`NaN` matches `NaN`)
//! - [`Value::same_value`]: change detection (`+0` and `-0` differ)
//!
//! `PartialEq` uses `same_value`.

use crate::object::ObjectRef;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

// ============================================================================
// Symbols
// ============================================================================

/// The language's built-in, well-known symbols
///
/// Property reads keyed by one of these are protocol accesses (iteration,
/// coercion, tagging) rather than data accesses and are never tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    AsyncIterator,
    HasInstance,
    IsConcatSpreadable,
    Iterator,
    Match,
    MatchAll,
    Replace,
    Search,
    Species,
    Split,
    ToPrimitive,
    ToStringTag,
    Unscopables,
}

impl WellKnownSymbol {
    /// Every well-known symbol
    pub const ALL: [WellKnownSymbol; 13] = [
        WellKnownSymbol::AsyncIterator,
        WellKnownSymbol::HasInstance,
        WellKnownSymbol::IsConcatSpreadable,
        WellKnownSymbol::Iterator,
        WellKnownSymbol::Match,
        WellKnownSymbol::MatchAll,
        WellKnownSymbol::Replace,
        WellKnownSymbol::Search,
        WellKnownSymbol::Species,
        WellKnownSymbol::Split,
        WellKnownSymbol::ToPrimitive,
        WellKnownSymbol::ToStringTag,
        WellKnownSymbol::Unscopables,
    ];

    /// Description as shown by `Symbol.prototype.description`
    pub const fn description(self) -> &'static str {
        match self {
            WellKnownSymbol::AsyncIterator => "Symbol.asyncIterator",
            WellKnownSymbol::HasInstance => "Symbol.hasInstance",
            WellKnownSymbol::IsConcatSpreadable => "Symbol.isConcatSpreadable",
            WellKnownSymbol::Iterator => "Symbol.iterator",
            WellKnownSymbol::Match => "Symbol.match",
            WellKnownSymbol::MatchAll => "Symbol.matchAll",
            WellKnownSymbol::Replace => "Symbol.replace",
            WellKnownSymbol::Search => "Symbol.search",
            WellKnownSymbol::Species => "Symbol.species",
            WellKnownSymbol::Split => "Symbol.split",
            WellKnownSymbol::ToPrimitive => "Symbol.toPrimitive",
            WellKnownSymbol::ToStringTag => "Symbol.toStringTag",
            WellKnownSymbol::Unscopables => "Symbol.unscopables",
        }
    }
}

/// Identity carrier for a runtime-created symbol
#[derive(Debug)]
pub struct SymbolData {
    description: Option<String>,
}

/// A symbol value
///
/// Locally created symbols are unique: two symbols with the same
/// description are still different keys.
#[derive(Clone)]
pub enum Symbol {
    /// One of the built-in symbols
    WellKnown(WellKnownSymbol),
    /// A symbol created at runtime
    Local(Rc<SymbolData>),
}

impl Symbol {
    /// Create a fresh, unique symbol
    pub fn new(description: Option<&str>) -> Self {
        Symbol::Local(Rc::new(SymbolData {
            description: description.map(str::to_string),
        }))
    }

    /// `Symbol.iterator`
    pub const fn iterator() -> Self {
        Symbol::WellKnown(WellKnownSymbol::Iterator)
    }

    /// Symbol description, if any
    pub fn description(&self) -> Option<&str> {
        match self {
            Symbol::WellKnown(w) => Some(w.description()),
            Symbol::Local(data) => data.description.as_deref(),
        }
    }

    /// Whether this is one of the built-in symbols
    pub fn is_well_known(&self) -> bool {
        matches!(self, Symbol::WellKnown(_))
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Symbol::WellKnown(a), Symbol::WellKnown(b)) => a == b,
            (Symbol::Local(a), Symbol::Local(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Symbol::WellKnown(w) => {
                0u8.hash(state);
                w.hash(state);
            }
            Symbol::Local(data) => {
                1u8.hash(state);
                (Rc::as_ptr(data) as usize).hash(state);
            }
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or(""))
    }
}

// ============================================================================
// Property keys
// ============================================================================

/// Key of an object property
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String key (array indices are canonical numeric strings)
    String(Rc<str>),
    /// Symbol key
    Symbol(Symbol),
}

impl PropertyKey {
    /// String content, if this is a string key
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::String(s) => Some(s),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// Array index denoted by this key
    ///
    /// Only canonical numeric strings qualify: `"0"` and `"17"` do,
    /// `"01"`, `"-1"`, `"1.5"` and `"NaN"` do not.
    pub fn as_index(&self) -> Option<usize> {
        let s = self.as_str()?;
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if s.len() > 1 && s.starts_with('0') {
            return None;
        }
        s.parse::<usize>().ok()
    }

    /// Whether this key addresses an array slot
    pub fn is_integer_key(&self) -> bool {
        self.as_index().is_some()
    }

    /// Whether this key is one of the built-in symbols
    pub fn is_builtin_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(s) if s.is_well_known())
    }

    /// Whether this key is a symbol
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    /// The key as a value (string or symbol)
    pub fn to_value(&self) -> Value {
        match self {
            PropertyKey::String(s) => Value::String(s.clone()),
            PropertyKey::Symbol(sym) => Value::Symbol(sym.clone()),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(Rc::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::String(Rc::from(s.as_str()))
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::String(Rc::from(index.to_string().as_str()))
    }
}

impl From<Symbol> for PropertyKey {
    fn from(sym: Symbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => f.write_str(s),
            PropertyKey::Symbol(sym) => write!(f, "{:?}", sym),
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{:?}", s),
            PropertyKey::Symbol(sym) => write!(f, "{:?}", sym),
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// A host value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Object(ObjectRef),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    /// Get type name for debugging
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(obj) if obj.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.same_non_number(other),
        }
    }

    /// SameValueZero: like `===` but `NaN` equals `NaN`
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.same_non_number(other),
        }
    }

    /// SameValue (`Object.is`): `NaN` equals `NaN`, `+0` differs from `-0`
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.same_non_number(other),
        }
    }

    fn same_non_number(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// ToNumber for primitives; objects convert to `NaN`
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Symbol(_) | Value::Object(_) => f64::NAN,
        }
    }

    /// ToIntegerOrInfinity
    pub fn to_integer_or_infinity(&self) -> f64 {
        let n = self.to_number();
        if n.is_nan() {
            0.0
        } else if n.is_infinite() {
            n
        } else {
            n.trunc() + 0.0
        }
    }
}

/// Number to string the way the language prints numbers
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(sym) => write!(f, "{:?}", sym),
            Value::Object(obj) => write!(f, "{:?}", obj),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Value::Symbol(sym)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

/// Build fresh raw targets from JSON: objects keep their key order, arrays
/// become arrays, numbers become `f64`.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => Value::Object(ObjectRef::new_array(
                items.into_iter().map(Value::from).collect(),
            )),
            serde_json::Value::Object(map) => {
                let obj = ObjectRef::new_object();
                {
                    let mut data = obj.borrow_mut();
                    for (key, value) in map {
                        data.properties.insert(PropertyKey::from(key), Value::from(value));
                    }
                }
                Value::Object(obj)
            }
        }
    }
}
