//! Tether Effects - Scoped Effect Execution & Cancellation
//!
//! The runtime half of tether: reducers (external to this workspace) return
//! [`Effect`] values describing asynchronous work; this crate starts that
//! work, correlates it with opaque cancellation identifiers in a shared
//! [`CancellablesRegistry`], and tears it down exactly once, with no
//! leaks, when it is cancelled by identifier or its enclosing scope goes
//! away.
//!
//! ## Flow
//!
//! ```text
//! Reducer → Effect → run(EffectContext) → actions ↩
//!                      │
//!                      └─ .cancellable(id) ⇄ CancellablesRegistry
//! ```
//!
//! Registrations fan out over every prefix of the scope path active when
//! the effect runs, so cancelling at an ancestor scope (a popped screen)
//! reaches all work started below it. Cancellation is a signal, never a
//! join: nothing in this crate blocks waiting for cancelled work to finish
//! winding down.

#![forbid(unsafe_code)]

/// Execution context effects run under
pub mod context;

/// Effect values and combinators
pub mod effect;

/// Shared registry of live cancellable registrations
pub mod registry;

/// Scoped cancellation for raw async work
pub mod scoped;

/// Tokio task spawner handler
pub mod task;

/// Real clock handler
pub mod time;

// === Public API Re-exports ===

pub use context::EffectContext;
pub use effect::{Effect, EffectSender, Operation};
pub use registry::CancellablesRegistry;
pub use scoped::{cancel_all_registrations, with_scoped_cancellation};
pub use task::TokioSpawner;
pub use time::SystemClock;

// Identifier vocabulary, re-exported so downstream reducer crates can
// depend on this crate alone.
pub use tether_core::{
    CancelId, CancelKey, CancelMarker, CancellationHandle, ClockEffects, ScopeMarker, ScopePath,
    ScopedError, SpawnedTask, TaskPriority, TaskSpawner,
};
