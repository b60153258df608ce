//! Effect values and their cancellation combinators.
//!
//! Reducers return [`Effect`]s; this module schedules them. An effect is an
//! ordered collection of [`Operation`]s, each either *eager* (a stream that
//! begins emitting as soon as the driver polls it, on the caller's task) or
//! *suspended* (an async unit handed to the host spawner as its own task).
//! The core does not interpret the actions an effect emits; it only knows
//! how to start, combine, and cancel the work producing them.
//!
//! Cancellation policy: cancelling an in-flight operation terminates its
//! delivery without emitting further values. Eager streams end; suspended
//! units are aborted at their next suspension point.

use crate::context::EffectContext;
use crate::registry::RegistrationGuard;
use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::stream::{self, BoxStream, FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tether_core::cancel::{CancelKey, CancelMarker, CancellationHandle};
use tether_core::effects::{ClockEffects, SpawnedTask, TaskPriority};
use tokio::sync::mpsc;

/// Delivery channel for actions produced by running effects.
///
/// Wraps the store's feedback channel; delivery into a closed channel is
/// silently dropped (the consumer has gone away, there is nobody left to
/// tell).
pub struct EffectSender<A> {
    deliver: Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>,
}

impl<A> Clone for EffectSender<A> {
    fn clone(&self) -> Self {
        Self {
            deliver: self.deliver.clone(),
        }
    }
}

impl<A: Send + 'static> EffectSender<A> {
    /// Deliver through an mpsc channel.
    pub fn new(tx: mpsc::Sender<A>) -> Self {
        Self {
            deliver: Arc::new(move |action| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(action).await;
                }
                .boxed()
            }),
        }
    }

    /// Send one action back to the store.
    pub async fn send(&self, action: A) {
        (self.deliver)(action).await;
    }

    /// A sender that applies `transform` before delivering into `self`.
    pub(crate) fn contramap<B, F>(&self, transform: F) -> EffectSender<B>
    where
        B: Send + 'static,
        F: Fn(B) -> A + Send + Sync + 'static,
    {
        let deliver = self.deliver.clone();
        EffectSender {
            deliver: Arc::new(move |action| deliver(transform(action))),
        }
    }
}

/// Start function of an eager operation: invoked with the run context,
/// returns the stream of actions to forward.
pub type EagerStart<A> = Box<dyn FnOnce(&EffectContext) -> BoxStream<'static, A> + Send>;

/// Start function of a suspended operation: invoked with the run context
/// and the delivery channel, returns the unit of work to schedule.
pub type SuspendedStart<A> =
    Box<dyn FnOnce(&EffectContext, EffectSender<A>) -> BoxFuture<'static, ()> + Send>;

/// One schedulable unit of work inside an [`Effect`].
pub enum Operation<A> {
    /// Begins emitting as soon as the driver polls it; runs on the caller's
    /// task up to its first suspension point and may stay live as a
    /// long-running subscription.
    Eager(EagerStart<A>),

    /// Handed to the spawner as an independently scheduled task.
    Suspended {
        /// Scheduling hint forwarded to the spawner.
        priority: TaskPriority,
        /// The unit of work.
        start: SuspendedStart<A>,
    },
}

impl<A> fmt::Debug for Operation<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager(_) => write!(f, "Operation::Eager"),
            Self::Suspended { priority, .. } => {
                write!(f, "Operation::Suspended({priority:?})")
            }
        }
    }
}

impl<A: Send + 'static> Operation<A> {
    fn map<B: Send + 'static>(self, f: Arc<dyn Fn(A) -> B + Send + Sync>) -> Operation<B> {
        match self {
            Self::Eager(start) => Operation::Eager(Box::new(move |ctx| {
                start(ctx).map(move |action| f(action)).boxed()
            })),
            Self::Suspended { priority, start } => Operation::Suspended {
                priority,
                start: Box::new(move |ctx, send| {
                    start(ctx, send.contramap(move |action| f(action)))
                }),
            },
        }
    }

    /// Wrap this operation so that starting it registers a cancellation
    /// handle under `(key, current scope)`, and finishing it (by any exit
    /// path) removes that handle exactly once.
    fn cancellable(self, key: CancelKey, cancel_in_flight: bool) -> Operation<A> {
        match self {
            Self::Eager(start) => Operation::Eager(Box::new(move |ctx| {
                let id = key.at(ctx.scope().clone());
                let (abort, abort_registration) = AbortHandle::new_pair();
                let handle = Arc::new(CancellationHandle::new(move || abort.abort()));
                let generation = handle.generation();
                ctx.registry()
                    .register_with(&id, cancel_in_flight, || (handle, ()));
                let guard = RegistrationGuard::new(ctx.registry().clone(), id, generation);

                // The guard rides in the stream state so it drops exactly
                // once: on completion, on cancellation, or when the driver
                // tears the stream down.
                let inner = Abortable::new(start(ctx), abort_registration);
                stream::unfold((inner, guard), |(mut inner, guard)| async move {
                    inner
                        .next()
                        .await
                        .map(|action| (action, (inner, guard)))
                })
                .boxed()
            })),
            Self::Suspended { priority, start } => Operation::Suspended {
                priority,
                start: Box::new(move |ctx, send| {
                    let id = key.at(ctx.scope().clone());
                    let (abort, abort_registration) = AbortHandle::new_pair();
                    let handle = Arc::new(CancellationHandle::new(move || abort.abort()));
                    let generation = handle.generation();
                    ctx.registry()
                        .register_with(&id, cancel_in_flight, || (handle, ()));
                    let guard = RegistrationGuard::new(ctx.registry().clone(), id, generation);

                    let inner = start(ctx, send);
                    async move {
                        let _guard = guard;
                        let _ = Abortable::new(inner, abort_registration).await;
                    }
                    .boxed()
                }),
            },
        }
    }
}

/// A composable collection of asynchronous work scheduled in response to a
/// state transition.
///
/// Effects are values: building and combining them performs no work. Work
/// starts when the store's runtime calls [`run`](Effect::run) with an
/// [`EffectContext`], and actions flow back through the supplied channel.
/// The empty effect is a valid no-op.
pub struct Effect<A> {
    operations: Vec<Operation<A>>,
}

impl<A> fmt::Debug for Effect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("operations", &self.operations)
            .finish()
    }
}

impl<A: Send + 'static> Effect<A> {
    /// An effect that does nothing.
    pub fn none() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Emit a single action eagerly.
    pub fn send(action: A) -> Self {
        Self {
            operations: vec![Operation::Eager(Box::new(move |_ctx| {
                stream::once(futures::future::ready(action)).boxed()
            }))],
        }
    }

    /// Forward every item of `stream` as an action (eager form).
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = A> + Send + 'static,
    {
        Self {
            operations: vec![Operation::Eager(Box::new(move |_ctx| stream.boxed()))],
        }
    }

    /// Run asynchronous work as an independently scheduled task (suspended
    /// form), delivering actions through the provided sender.
    pub fn task<F, Fut>(operation: F) -> Self
    where
        F: FnOnce(EffectSender<A>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::task_with_priority(TaskPriority::default(), operation)
    }

    /// [`task`](Effect::task) with an explicit scheduling hint.
    pub fn task_with_priority<F, Fut>(priority: TaskPriority, operation: F) -> Self
    where
        F: FnOnce(EffectSender<A>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            operations: vec![Operation::Suspended {
                priority,
                start: Box::new(move |_ctx, send| operation(send).boxed()),
            }],
        }
    }

    /// An effect whose only behavior is cancelling every registration for
    /// `id` at the scope it runs under. Issued synchronously at start;
    /// completes with no emissions. Cancelling an identifier nobody
    /// registered is a no-op.
    pub fn cancel<M: CancelMarker>(id: M) -> Self {
        let key = CancelKey::new(id);
        Self {
            operations: vec![Operation::Eager(Box::new(move |ctx| {
                ctx.registry().cancel(&key.at(ctx.scope().clone()));
                stream::empty().boxed()
            }))],
        }
    }

    /// True when running this effect would do nothing.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Transform every emitted action.
    pub fn map<B, F>(self, f: F) -> Effect<B>
    where
        B: Send + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let f: Arc<dyn Fn(A) -> B + Send + Sync> = Arc::new(f);
        Effect {
            operations: self
                .operations
                .into_iter()
                .map(|operation| operation.map(f.clone()))
                .collect(),
        }
    }

    /// Run `self` and `other` concurrently.
    pub fn merge(mut self, other: Effect<A>) -> Effect<A> {
        self.operations.extend(other.operations);
        self
    }

    /// Merge any number of effects.
    pub fn merge_all(effects: impl IntoIterator<Item = Effect<A>>) -> Effect<A> {
        effects.into_iter().fold(Effect::none(), Effect::merge)
    }

    /// Run `self` to completion, then `other`.
    pub fn concat(self, other: Effect<A>) -> Effect<A> {
        Self::concatenate([self, other])
    }

    /// Run each effect to completion before starting the next.
    pub fn concatenate(effects: impl IntoIterator<Item = Effect<A>>) -> Effect<A> {
        let mut effects: Vec<Effect<A>> = effects.into_iter().collect();
        effects.retain(|effect| !effect.is_empty());
        if effects.is_empty() {
            return Effect::none();
        }
        if effects.len() == 1 {
            // No sequencing to do.
            return effects.remove(0);
        }
        Effect {
            operations: vec![Operation::Suspended {
                priority: TaskPriority::default(),
                start: Box::new(move |ctx, send| {
                    let ctx = ctx.clone();
                    async move {
                        for effect in effects {
                            effect.drive_inline(&ctx, send.clone()).await;
                        }
                    }
                    .boxed()
                }),
            }],
        }
    }

    /// Make this effect cancellable under `id`.
    ///
    /// At start time each operation registers a cancellation handle under
    /// the `CancelId` formed from `id` and the context's current scope,
    /// fanned out to every ancestor prefix, and removes it exactly once on
    /// completion, failure, or cancellation. With `cancel_in_flight` set,
    /// any registration already live under the same id is cancelled first,
    /// under the same lock acquisition that inserts the new handle, so a
    /// racing duplicate can never cancel the replacement it raced with.
    pub fn cancellable<M: CancelMarker>(self, id: M, cancel_in_flight: bool) -> Effect<A> {
        let key = CancelKey::new(id);
        Effect {
            operations: self
                .operations
                .into_iter()
                .map(|operation| operation.cancellable(key.clone(), cancel_in_flight))
                .collect(),
        }
    }

    /// Restartable delay: sleep `delay_ms`, then run `self`, all under
    /// `cancellable(id, cancel_in_flight: true)`.
    ///
    /// Triggering the same id again while the delay (or the work) is in
    /// flight cancels the previous run, so only the most recent trigger
    /// ever completes. This is the debounce pattern.
    pub fn debounce<M: CancelMarker>(
        self,
        id: M,
        delay_ms: u64,
        clock: Arc<dyn ClockEffects>,
    ) -> Effect<A> {
        let inner = self;
        Effect {
            operations: vec![Operation::Suspended {
                priority: TaskPriority::default(),
                start: Box::new(move |ctx, send| {
                    let ctx = ctx.clone();
                    async move {
                        clock.sleep_ms(delay_ms).await;
                        inner.drive_inline(&ctx, send).await;
                    }
                    .boxed()
                }),
            }],
        }
        .cancellable(id, true)
    }

    /// Start every operation under `ctx`, delivering actions into `tx`.
    ///
    /// Eager operations are polled on the calling task (concurrently with
    /// one another) until their streams end; suspended operations are
    /// handed to the spawner and returned so a host can join or tear them
    /// down. Registration and cancellation side effects happen
    /// synchronously, in operation order, before anything is polled.
    pub async fn run(self, ctx: &EffectContext, tx: mpsc::Sender<A>) -> Vec<Arc<dyn SpawnedTask>> {
        self.run_with(ctx, EffectSender::new(tx)).await
    }

    /// [`run`](Effect::run) with an existing delivery channel.
    pub async fn run_with(
        self,
        ctx: &EffectContext,
        send: EffectSender<A>,
    ) -> Vec<Arc<dyn SpawnedTask>> {
        let mut eager = Vec::new();
        let mut tasks = Vec::new();
        for operation in self.operations {
            match operation {
                Operation::Eager(start) => eager.push(start(ctx)),
                Operation::Suspended { priority, start } => {
                    let unit = start(ctx, send.clone());
                    tasks.push(ctx.spawner().spawn(priority, unit));
                }
            }
        }

        let mut merged = stream::select_all(eager);
        while let Some(action) = merged.next().await {
            send.send(action).await;
        }
        tasks
    }

    /// Drive every operation on the current task (concurrently, but
    /// without handing anything to the spawner) until all of them finish.
    ///
    /// This is what sequencing combinators use: keeping the constituent
    /// work inside one future means an enclosing `cancellable` wrapper
    /// tears all of it down at once.
    async fn drive_inline(self, ctx: &EffectContext, send: EffectSender<A>) {
        let mut units: FuturesUnordered<BoxFuture<'static, ()>> = FuturesUnordered::new();
        for operation in self.operations {
            match operation {
                Operation::Eager(start) => {
                    let mut stream = start(ctx);
                    let send = send.clone();
                    units.push(
                        async move {
                            while let Some(action) = stream.next().await {
                                send.send(action).await;
                            }
                        }
                        .boxed(),
                    );
                }
                Operation::Suspended { priority: _, start } => {
                    units.push(start(ctx, send.clone()));
                }
            }
        }
        while units.next().await.is_some() {}
    }
}
