//! Runtime-agnostic task spawning traits.
//!
//! The cancellation core does not schedule work itself; it delegates to a
//! host substrate through [`TaskSpawner`] and holds on to the returned
//! [`SpawnedTask`] handles. Handlers live in `tether-effects`.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Scheduling hint forwarded to the host scheduler.
///
/// Advisory only: a substrate without priority lanes may ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    /// Latency-sensitive work.
    High,
    /// Ordinary effect work.
    #[default]
    Medium,
    /// Deferrable work.
    Low,
    /// Housekeeping that should never displace interactive work.
    Background,
}

/// Handle to one spawned unit of concurrent work.
///
/// Cancellation is a signal, not a synchronous join: [`cancel`] requests
/// cooperative teardown and returns immediately; [`joined`] is the separate,
/// awaitable observation that the unit has fully stopped.
///
/// [`cancel`]: SpawnedTask::cancel
/// [`joined`]: SpawnedTask::joined
#[async_trait]
pub trait SpawnedTask: Send + Sync {
    /// Request cancellation of the unit. Non-blocking, idempotent.
    fn cancel(&self);

    /// True once the unit has stopped, whether it finished or was torn down.
    fn is_finished(&self) -> bool;

    /// Resolves when the unit has fully stopped.
    ///
    /// Carries no value; results travel through channels owned by the
    /// spawned future.
    async fn joined(&self);
}

/// Task spawning contract for runtime implementations.
pub trait TaskSpawner: Send + Sync {
    /// Spawn `fut` as an independently scheduled unit of work.
    fn spawn(&self, priority: TaskPriority, fut: BoxFuture<'static, ()>) -> Arc<dyn SpawnedTask>;
}

/// Blanket implementation for Arc<T> where T: TaskSpawner
impl<T: TaskSpawner + ?Sized> TaskSpawner for Arc<T> {
    fn spawn(&self, priority: TaskPriority, fut: BoxFuture<'static, ()>) -> Arc<dyn SpawnedTask> {
        (**self).spawn(priority, fut)
    }
}
