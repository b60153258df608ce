//! Cancellation-by-identifier for work outside the [`Effect`] chain.
//!
//! [`with_scoped_cancellation`] gives a raw async operation the same
//! guarantee `Effect::cancellable` gives an effect: registered before it
//! starts, discoverable from every ancestor scope, removed exactly once on
//! any exit path.
//!
//! [`Effect`]: crate::effect::Effect

use crate::registry::{CancellablesRegistry, RegistrationGuard};
use std::future::Future;
use std::sync::Arc;
use tether_core::cancel::{CancelKey, CancelMarker, CancellationHandle};
use tether_core::errors::ScopedError;
use tether_core::scope::ScopePath;

/// Aborts the spawned unit if the awaiting caller goes away first.
///
/// Aborting a finished task is a no-op, so this needs no disarm step.
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `operation` as a cancellable unit registered under `(id, scope)`.
///
/// Under a single registry lock acquisition this cancels any existing
/// registration at the derived `CancelId` (when `cancel_in_flight` is set),
/// spawns the operation, and registers a handle that aborts it. The lock is
/// released before awaiting, and a drop guard removes the registration on
/// every exit: normal return, failure, cancellation, or the caller dropping
/// this future.
///
/// The operation's success value and failure propagate unchanged.
/// Cancellation (by identifier from anywhere holding the same triple, or
/// by an enclosing scope being torn down) surfaces as
/// [`ScopedError::Cancelled`], never as a domain error. A panic inside the
/// operation resumes unwinding in the caller.
pub async fn with_scoped_cancellation<M, T, E, F, Fut>(
    registry: &Arc<CancellablesRegistry>,
    id: M,
    scope: &ScopePath,
    cancel_in_flight: bool,
    operation: F,
) -> Result<T, ScopedError<E>>
where
    M: CancelMarker,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let id = CancelKey::new(id).at(scope.clone());
    let (join, generation) = registry.register_with(&id, cancel_in_flight, || {
        // Spawning under the lock means a racing cancel-in-flight request
        // for the old registration can never reach the new unit.
        let join = tokio::spawn(operation());
        let abort = join.abort_handle();
        let handle = Arc::new(CancellationHandle::new(move || abort.abort()));
        let generation = handle.generation();
        (handle, (join, generation))
    });

    let _guard = RegistrationGuard::new(registry.clone(), id, generation);
    let _caller_gone = AbortOnDrop(join.abort_handle());

    match join.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ScopedError::Failed(err)),
        Err(join_err) if join_err.is_cancelled() => Err(ScopedError::Cancelled),
        Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
    }
}

/// Cancel every live registration for `id` at `scope`, synchronously.
///
/// Identical semantics to running `Effect::cancel(id)` at that scope, for
/// call sites with no asynchronous context. Cancelling an identifier with
/// no live registration is a silent no-op.
///
/// [`Effect::cancel`]: crate::effect::Effect::cancel
pub fn cancel_all_registrations<M: CancelMarker>(
    registry: &CancellablesRegistry,
    id: M,
    scope: &ScopePath,
) {
    registry.cancel(&CancelKey::new(id).at(scope.clone()));
}
