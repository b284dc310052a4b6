//! Dependency graph boundary
//!
//! The interception layer never owns subscriber lists or scheduling. It
//! reports reads (`track`) and writes (`trigger`) to the graph installed on
//! the current thread, and brackets length-mutating array methods with the
//! graph's pause and batch controls.
//!
//! ## Scopes
//!
//! Pause and batch are depth-counted by the graph. Inside this crate they
//! are only entered through [`TrackingPaused`] and [`BatchScope`], whose
//! `Drop` releases them on every exit path, including `?` returns.
//!
//! ## Recording
//!
//! [`EventRecorder`] is a complete, counter-based graph that records what it
//! is told instead of scheduling anything. Tests and embedders use it to
//! observe exactly which edges the handlers report.

use crate::object::ObjectRef;
use crate::value::{PropertyKey, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Operation kinds and keys
// ============================================================================

/// Read-side operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Write-side operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
}

/// Key a dependency is recorded under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A single property
    Property(PropertyKey),
    /// Every key of an object (enumeration)
    Iterate,
    /// Every element of an array (whole-array reads)
    ArrayIterate,
}

/// Pseudo-key for "iterate all object keys"
pub const ITERATE_KEY: DepKey = DepKey::Iterate;

/// Pseudo-key for "iterate all array elements"
pub const ARRAY_ITERATE_KEY: DepKey = DepKey::ArrayIterate;

impl From<PropertyKey> for DepKey {
    fn from(key: PropertyKey) -> Self {
        DepKey::Property(key)
    }
}

impl From<&PropertyKey> for DepKey {
    fn from(key: &PropertyKey) -> Self {
        DepKey::Property(key.clone())
    }
}

impl From<&str> for DepKey {
    fn from(key: &str) -> Self {
        DepKey::Property(PropertyKey::from(key))
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Property(key) => write!(f, "{}", key),
            DepKey::Iterate => f.write_str("<iterate>"),
            DepKey::ArrayIterate => f.write_str("<array iterate>"),
        }
    }
}

// ============================================================================
// Graph interface
// ============================================================================

/// The dependency graph the handlers report to
///
/// Every method must be safe to call with no subscriber collecting.
/// `pause_tracking` / `enable_tracking` push a tracking state that
/// `reset_tracking` pops; `start_batch` / `end_batch` nest, and deferred
/// triggers are delivered when the outermost batch ends.
pub trait DependencyGraph {
    fn track(&self, target: &ObjectRef, op: TrackOp, key: &DepKey);

    fn trigger(
        &self,
        target: &ObjectRef,
        op: TriggerOp,
        key: &DepKey,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
    );

    fn pause_tracking(&self);

    fn enable_tracking(&self);

    fn reset_tracking(&self);

    fn start_batch(&self);

    fn end_batch(&self);
}

/// Graph that ignores everything; installed until a real one is
struct NoopGraph;

impl DependencyGraph for NoopGraph {
    fn track(&self, _target: &ObjectRef, _op: TrackOp, _key: &DepKey) {}

    fn trigger(
        &self,
        _target: &ObjectRef,
        _op: TriggerOp,
        _key: &DepKey,
        _new_value: Option<&Value>,
        _old_value: Option<&Value>,
    ) {
    }

    fn pause_tracking(&self) {}

    fn enable_tracking(&self) {}

    fn reset_tracking(&self) {}

    fn start_batch(&self) {}

    fn end_batch(&self) {}
}

thread_local! {
    static GRAPH: RefCell<Rc<dyn DependencyGraph>> = RefCell::new(Rc::new(NoopGraph));
}

/// Install the graph for this thread, returning the previous one
pub fn set_dependency_graph(graph: Rc<dyn DependencyGraph>) -> Rc<dyn DependencyGraph> {
    GRAPH.with(|slot| slot.replace(graph))
}

/// Graph installed on this thread
///
/// Cloned out so the graph may itself re-enter the object model or swap the
/// installed graph while handling a call.
pub fn current_graph() -> Rc<dyn DependencyGraph> {
    GRAPH.with(|slot| slot.borrow().clone())
}

/// Report a read of `(target, key)`
pub fn track(target: &ObjectRef, op: TrackOp, key: impl Into<DepKey>) {
    current_graph().track(target, op, &key.into());
}

/// Report a write of `(target, key)`
pub fn trigger(
    target: &ObjectRef,
    op: TriggerOp,
    key: impl Into<DepKey>,
    new_value: Option<&Value>,
    old_value: Option<&Value>,
) {
    current_graph().trigger(target, op, &key.into(), new_value, old_value);
}

pub fn pause_tracking() {
    current_graph().pause_tracking();
}

pub fn enable_tracking() {
    current_graph().enable_tracking();
}

pub fn reset_tracking() {
    current_graph().reset_tracking();
}

pub fn start_batch() {
    current_graph().start_batch();
}

pub fn end_batch() {
    current_graph().end_batch();
}

// ============================================================================
// Scopes
// ============================================================================

/// Tracking is paused while this guard lives
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct TrackingPaused {
    graph: Rc<dyn DependencyGraph>,
}

impl TrackingPaused {
    pub fn new() -> Self {
        let graph = current_graph();
        graph.pause_tracking();
        Self { graph }
    }
}

impl Default for TrackingPaused {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackingPaused {
    fn drop(&mut self) {
        self.graph.reset_tracking();
    }
}

/// Triggers are batched while this guard lives
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct BatchScope {
    graph: Rc<dyn DependencyGraph>,
}

impl BatchScope {
    pub fn new() -> Self {
        let graph = current_graph();
        graph.start_batch();
        Self { graph }
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        self.graph.end_batch();
    }
}

// ============================================================================
// Recording graph
// ============================================================================

/// A recorded `track` call
#[derive(Debug, Clone)]
pub struct TrackEvent {
    pub target: ObjectRef,
    pub op: TrackOp,
    pub key: DepKey,
}

/// A recorded `trigger` call
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub target: ObjectRef,
    pub op: TriggerOp,
    pub key: DepKey,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

impl TrackEvent {
    /// Whether this event is `(target, op, key)`
    pub fn matches(&self, target: &ObjectRef, op: TrackOp, key: &DepKey) -> bool {
        self.target.ptr_eq(target) && self.op == op && &self.key == key
    }
}

/// Graph that records reads and writes
///
/// Tracks are dropped while tracking is paused. Triggers fired inside a
/// batch are held and delivered together when the outermost batch ends;
/// a trigger outside any batch is delivered alone.
#[derive(Default)]
pub struct EventRecorder {
    tracking: RefCell<Vec<bool>>,
    batch_depth: Cell<usize>,
    tracks: RefCell<Vec<TrackEvent>>,
    pending: RefCell<Vec<TriggerEvent>>,
    deliveries: RefCell<Vec<Vec<TriggerEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Install this recorder on the current thread, returning the previous
    /// graph
    pub fn install(self: &Rc<Self>) -> Rc<dyn DependencyGraph> {
        set_dependency_graph(self.clone())
    }

    /// Whether a `track` would currently be recorded
    pub fn should_track(&self) -> bool {
        self.tracking.borrow().last().copied().unwrap_or(true)
    }

    /// Nesting depth of pause/enable scopes
    pub fn tracking_depth(&self) -> usize {
        self.tracking.borrow().len()
    }

    /// Nesting depth of batches
    pub fn batch_depth(&self) -> usize {
        self.batch_depth.get()
    }

    pub fn tracks(&self) -> Vec<TrackEvent> {
        self.tracks.borrow().clone()
    }

    /// Number of recorded tracks of `(target, op, key)`
    pub fn count_tracks(&self, target: &ObjectRef, op: TrackOp, key: impl Into<DepKey>) -> usize {
        let key = key.into();
        self.tracks
            .borrow()
            .iter()
            .filter(|event| event.matches(target, op, &key))
            .count()
    }

    /// Delivered triggers, one entry per delivery unit
    pub fn deliveries(&self) -> Vec<Vec<TriggerEvent>> {
        self.deliveries.borrow().clone()
    }

    /// Delivered triggers, flattened
    pub fn triggers(&self) -> Vec<TriggerEvent> {
        self.deliveries.borrow().iter().flatten().cloned().collect()
    }

    /// Triggers held by an open batch
    pub fn pending(&self) -> Vec<TriggerEvent> {
        self.pending.borrow().clone()
    }

    /// Forget recorded events (scope state is kept)
    pub fn clear(&self) {
        self.tracks.borrow_mut().clear();
        self.pending.borrow_mut().clear();
        self.deliveries.borrow_mut().clear();
    }
}

impl DependencyGraph for EventRecorder {
    fn track(&self, target: &ObjectRef, op: TrackOp, key: &DepKey) {
        if !self.should_track() {
            return;
        }
        self.tracks.borrow_mut().push(TrackEvent {
            target: target.clone(),
            op,
            key: key.clone(),
        });
    }

    fn trigger(
        &self,
        target: &ObjectRef,
        op: TriggerOp,
        key: &DepKey,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
    ) {
        let event = TriggerEvent {
            target: target.clone(),
            op,
            key: key.clone(),
            new_value: new_value.cloned(),
            old_value: old_value.cloned(),
        };
        if self.batch_depth.get() > 0 {
            self.pending.borrow_mut().push(event);
        } else {
            self.deliveries.borrow_mut().push(vec![event]);
        }
    }

    fn pause_tracking(&self) {
        self.tracking.borrow_mut().push(false);
    }

    fn enable_tracking(&self) {
        self.tracking.borrow_mut().push(true);
    }

    fn reset_tracking(&self) {
        self.tracking.borrow_mut().pop();
    }

    fn start_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    fn end_batch(&self) {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if depth == 0 {
            let batch = std::mem::take(&mut *self.pending.borrow_mut());
            if !batch.is_empty() {
                self.deliveries.borrow_mut().push(batch);
            }
        }
    }
}
