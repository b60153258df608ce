//! Tokio task spawner handler.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tether_core::effects::{SpawnedTask, TaskPriority, TaskSpawner};
use tokio::sync::watch;

/// [`TaskSpawner`] over `tokio::spawn`.
///
/// Cancellation maps to task abort, which takes effect at the unit's next
/// suspension point. Tokio's scheduler has no priority lanes; the hint is
/// recorded in trace output only.
#[derive(Debug, Default, Clone)]
pub struct TokioSpawner;

impl TokioSpawner {
    /// Create a spawner. Must be used from within a tokio runtime.
    pub fn new() -> Self {
        Self
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, priority: TaskPriority, fut: BoxFuture<'static, ()>) -> Arc<dyn SpawnedTask> {
        let (done_tx, done_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            fut.await;
            let _ = done_tx.send(true);
        });
        tracing::trace!(target: "tether::spawn", ?priority, "spawned effect task");
        Arc::new(TokioTask {
            abort: join.abort_handle(),
            done: done_rx,
        })
    }
}

/// Handle to one spawned tokio task.
///
/// The completion watch channel doubles as the join signal: a send marks
/// normal completion, and the sender being dropped (task aborted) closes
/// the channel.
#[derive(Debug)]
struct TokioTask {
    abort: tokio::task::AbortHandle,
    done: watch::Receiver<bool>,
}

#[async_trait]
impl SpawnedTask for TokioTask {
    fn cancel(&self) {
        self.abort.abort();
    }

    fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    async fn joined(&self) {
        let mut done = self.done.clone();
        loop {
            if *done.borrow() {
                return;
            }
            if done.changed().await.is_err() {
                return;
            }
        }
    }
}
