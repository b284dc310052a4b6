//! Object model
//!
//! Every heap value is an [`ObjectRef`]: a shared, interior-mutable handle
//! compared by identity. An object carries a kind-specific payload, an
//! ordered own-property table and an optional prototype.
//!
//! Borrow discipline: callers never hold a borrow of an object across a call
//! that may re-enter the object model (handlers, native functions, the
//! dependency graph). Data is cloned out first.

use crate::builtins;
use crate::proxy::ProxyHandler;
use crate::value::{PropertyKey, Value};
use crate::Result;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

/// Signature of a native function: `(this, arguments) -> result`
pub type NativeFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value>>;

/// Ordered own-property table
pub type PropertyMap = IndexMap<PropertyKey, Value, FxBuildHasher>;

/// Callable object payload
#[derive(Clone)]
pub struct FunctionData {
    /// Function name (`fn.name`)
    pub name: Rc<str>,
    pub(crate) call: NativeFn,
}

/// Single-slot indirection box payload
#[derive(Debug, Clone)]
pub struct RefBox {
    /// Canonical form of the stored value, used for change detection
    pub raw: Value,
    /// Value handed out on read (wrapped unless the box is shallow)
    pub value: Value,
    /// Stored values are kept as-is instead of being wrapped
    pub shallow: bool,
    /// Writes through `.value` are refused
    pub readonly: bool,
}

/// Proxy payload: the intercepted target and its handler table
#[derive(Clone)]
pub struct ProxyData {
    pub target: ObjectRef,
    pub handler: Rc<dyn ProxyHandler>,
}

/// Kind-specific payload of an object
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Dense array; `length` is the vector length
    Array(Vec<Value>),
    /// Native function
    Function(FunctionData),
    /// Indirection box exposing `.value`
    Ref(RefBox),
    /// Intercepting facade over another object
    Proxy(ProxyData),
}

impl ObjectKind {
    fn label(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Ref(_) => "Ref",
            ObjectKind::Proxy(_) => "Proxy",
        }
    }
}

/// Object instance (heap-allocated)
pub struct ObjectData {
    pub kind: ObjectKind,
    /// Own properties in insertion order
    pub properties: PropertyMap,
    pub prototype: Option<ObjectRef>,
    /// Hidden "never wrap me" marker, surfaced through `__v_skip`
    pub skip: bool,
    pub extensible: bool,
}

impl ObjectData {
    fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            properties: PropertyMap::default(),
            prototype,
            skip: false,
            extensible: true,
        }
    }
}

/// Shared handle to a heap object
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

/// Non-owning handle, used by identity caches
#[derive(Clone)]
pub struct WeakObjectRef(Weak<RefCell<ObjectData>>);

impl ObjectRef {
    /// Allocate an object with an explicit prototype
    pub fn with_prototype(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        ObjectRef(Rc::new(RefCell::new(ObjectData::new(kind, prototype))))
    }

    /// Create an empty plain object inheriting from `Object.prototype`
    pub fn new_object() -> Self {
        Self::with_prototype(ObjectKind::Ordinary, Some(builtins::object_prototype()))
    }

    /// Create an array inheriting from `Array.prototype`
    pub fn new_array(elements: Vec<Value>) -> Self {
        Self::with_prototype(ObjectKind::Array(elements), Some(builtins::array_prototype()))
    }

    /// Create a native function object
    pub fn new_function<F>(name: &str, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        Self::with_prototype(
            ObjectKind::Function(FunctionData {
                name: Rc::from(name),
                call: Rc::new(f),
            }),
            Some(builtins::object_prototype()),
        )
    }

    /// Create an intercepting proxy over `target`
    pub fn new_proxy(target: ObjectRef, handler: Rc<dyn ProxyHandler>) -> Self {
        Self::with_prototype(ObjectKind::Proxy(ProxyData { target, handler }), None)
    }

    /// Identity comparison
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity, stable for the object's lifetime
    #[inline]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }

    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.0))
    }

    pub fn borrow(&self) -> Ref<'_, ObjectData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ObjectData> {
        self.0.borrow_mut()
    }

    /// Whether this object itself is an array (proxies are not looked through)
    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    /// Whether this object is an indirection box
    pub fn is_ref_box(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Ref(_))
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Proxy(_))
    }

    /// Target and handler of a proxy, cloned out of the borrow
    pub fn proxy_parts(&self) -> Option<ProxyData> {
        match &self.borrow().kind {
            ObjectKind::Proxy(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Callable payload, cloned out of the borrow
    pub fn native_fn(&self) -> Option<NativeFn> {
        match &self.borrow().kind {
            ObjectKind::Function(data) => Some(data.call.clone()),
            _ => None,
        }
    }

    /// Snapshot of an array's elements (empty for other kinds)
    pub fn array_elements(&self) -> Vec<Value> {
        match &self.borrow().kind {
            ObjectKind::Array(elements) => elements.clone(),
            _ => Vec::new(),
        }
    }
}

impl WeakObjectRef {
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => match &data.kind {
                ObjectKind::Function(func) => write!(f, "[Function {}]@{:#x}", func.name, self.id()),
                kind => write!(f, "[{}]@{:#x}", kind.label(), self.id()),
            },
            Err(_) => write!(f, "[object (borrowed)]@{:#x}", self.id()),
        }
    }
}
