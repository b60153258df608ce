//! Cancellation identifiers and single-fire cancellation handles.
//!
//! Effects are cancelled by *identity*, not by holding onto a task: any code
//! that can name the same `(identifier type, identifier value, scope)`
//! triple can cancel another party's work. [`CancelKey`] carries the typed
//! identifier, [`CancelId`] pins it to the scope it was registered under,
//! and [`CancellationHandle`] is one live registration with an idempotent
//! cancel signal.

use crate::scope::ScopePath;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Marker bound for values usable as cancellation identifiers.
///
/// Any equality/hash-comparable `'static` value qualifies; enums declared
/// next to the reducer that owns the effect are the common case.
pub trait CancelMarker: Any + Eq + Hash + fmt::Debug + Send + Sync {}

impl<T> CancelMarker for T where T: Any + Eq + Hash + fmt::Debug + Send + Sync {}

/// Object-safe view over an erased identifier value.
trait AnyKey: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_dyn(&self, other: &dyn AnyKey) -> bool;
    fn hash_dyn(&self, state: &mut dyn Hasher);
    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> AnyKey for T
where
    T: Any + Eq + Hash + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn AnyKey) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A typed, type-erased cancellation identifier.
///
/// Two keys are equal iff their declared types match *and* the underlying
/// values compare equal. The type tag keeps distinct identifier types that
/// share a raw value (say, two enums both hashing their first variant) from
/// colliding in the registry.
#[derive(Clone)]
pub struct CancelKey {
    tag: TypeId,
    type_name: &'static str,
    value: Arc<dyn AnyKey>,
}

impl CancelKey {
    /// Erase `value` into a key, remembering its declared type.
    pub fn new<T: CancelMarker>(value: T) -> Self {
        Self {
            tag: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// The declared type's tag.
    pub fn tag(&self) -> TypeId {
        self.tag
    }

    /// Pin this key to the scope it is being registered under.
    pub fn at(self, scope: ScopePath) -> CancelId {
        CancelId { key: self, scope }
    }
}

impl PartialEq for CancelKey {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.value.eq_dyn(other.value.as_ref())
    }
}

impl Eq for CancelKey {}

impl Hash for CancelKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag.hash(state);
        self.value.hash_dyn(state);
    }
}

impl fmt::Debug for CancelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name)?;
        self.value.fmt_debug(f)?;
        write!(f, ")")
    }
}

/// Identity of one cancellable slot: identifier plus the scope path active
/// when the registration was made.
///
/// Equal iff identifier type, identifier value, and scope all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CancelId {
    key: CancelKey,
    scope: ScopePath,
}

impl CancelId {
    /// Combine an identifier with the scope it is registered under.
    pub fn new(key: CancelKey, scope: ScopePath) -> Self {
        Self { key, scope }
    }

    /// The typed identifier component.
    pub fn key(&self) -> &CancelKey {
        &self.key
    }

    /// The scope component.
    pub fn scope(&self) -> &ScopePath {
        &self.scope
    }

    /// The same identifier re-keyed at another scope (an ancestor prefix,
    /// when fanning registrations out).
    pub fn with_scope(&self, scope: ScopePath) -> Self {
        Self {
            key: self.key.clone(),
            scope,
        }
    }
}

impl fmt::Display for CancelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {}", self.key, self.scope)
    }
}

fn next_generation() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// One live cancellable registration.
///
/// Wraps the signal that terminates the underlying unit of work. The signal
/// fires at most once no matter how many call sites race on [`cancel`];
/// cancelling never blocks on the cancelled work winding down.
///
/// Handles are identified by a process-wide monotonic generation counter
/// rather than by reference, so a registry can store and remove them
/// structurally.
///
/// [`cancel`]: CancellationHandle::cancel
pub struct CancellationHandle {
    generation: u64,
    fired: AtomicBool,
    signal: Box<dyn Fn() + Send + Sync>,
}

impl CancellationHandle {
    /// Wrap a cancel signal. The signal must be non-blocking.
    pub fn new(signal: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            generation: next_generation(),
            fired: AtomicBool::new(false),
            signal: Box::new(signal),
        }
    }

    /// The handle's unique generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fire the cancel signal. Idempotent: only the first call has effect.
    pub fn cancel(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            (self.signal)();
        }
    }

    /// True once [`cancel`](CancellationHandle::cancel) has been invoked.
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CancellationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationHandle")
            .field("generation", &self.generation)
            .field("fired", &self.fired.load(Ordering::SeqCst))
            .finish()
    }
}
