//! Tether Core - Cancellation Identity Foundation
//!
//! Foundational types for lifecycle-scoped effect cancellation: opaque
//! typed identifiers, hierarchical scope paths, and single-fire
//! cancellation handles, plus the effect-trait seams through which the
//! runtime layer reaches the host's concurrency substrate.
//!
//! This crate holds no live state and spawns nothing. The shared registry
//! correlating identifiers with running work, the `Effect` value type, and
//! the tokio-backed handlers all live in `tether-effects`.

#![forbid(unsafe_code)]

/// Cancellation identifiers and single-fire handles
pub mod cancel;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Hierarchical scope paths
pub mod scope;

// === Public API Re-exports ===

pub use cancel::{CancelId, CancelKey, CancelMarker, CancellationHandle};
pub use effects::{ClockEffects, SpawnedTask, TaskPriority, TaskSpawner};
pub use errors::ScopedError;
pub use scope::{ScopeMarker, ScopePath};
