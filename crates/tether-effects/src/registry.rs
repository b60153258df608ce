//! Shared registry correlating cancellation identifiers with live work.
//!
//! The registry is the only shared mutable state in this workspace. Every
//! operation runs entirely under one `parking_lot` mutex, never suspends,
//! and never waits for cancelled work to wind down: cancellation is a
//! signal, not a join.
//!
//! Registrations fan out: a handle registered under scope `/0/2/1` is
//! inserted at `/0/2/1`, `/0/2`, `/0`, and `/`, so cancelling an identifier
//! at any ancestor scope reaches it. Removal strips the handle from every
//! prefix again, which is what keeps the table from accumulating stale
//! entries.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tether_core::cancel::{CancelId, CancellationHandle};
use tether_core::scope::ScopePath;

type HandleSet = HashMap<u64, Arc<CancellationHandle>>;
type Table = HashMap<CancelId, HandleSet>;

/// Process-wide table of live cancellable registrations.
///
/// Owned by the application's root execution context and shared by `Arc`
/// into every place effects are scheduled; there is deliberately no global
/// instance.
#[derive(Debug, Default)]
pub struct CancellablesRegistry {
    cancellables: Mutex<Table>,
}

impl CancellablesRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under every prefix of `id`'s scope.
    pub fn insert(&self, id: &CancelId, handle: Arc<CancellationHandle>) {
        let mut table = self.cancellables.lock();
        Self::insert_locked(&mut table, id, handle);
    }

    /// The cancel-in-flight primitive: under a single lock acquisition,
    /// optionally cancel everything at the exact `id`, then build the new
    /// handle via `make` and fan-out insert it.
    ///
    /// Holding the lock across `make` is what guarantees a racing duplicate
    /// request cancels the *old* registration and never the one being
    /// created. `make` must therefore not block or touch the registry.
    pub fn register_with<R>(
        &self,
        id: &CancelId,
        cancel_in_flight: bool,
        make: impl FnOnce() -> (Arc<CancellationHandle>, R),
    ) -> R {
        let mut table = self.cancellables.lock();
        if cancel_in_flight {
            Self::cancel_locked(&mut table, id);
        }
        let (handle, payload) = make();
        Self::insert_locked(&mut table, id, handle);
        payload
    }

    /// Remove one registration (by generation) from every prefix entry.
    ///
    /// Entries whose handle set becomes empty are deleted outright.
    /// Removing an unknown generation is a no-op; removal never cancels.
    pub fn remove(&self, id: &CancelId, generation: u64) {
        let mut table = self.cancellables.lock();
        for prefix in id.scope().prefixes() {
            let prefix_id = id.with_scope(prefix);
            if let Some(set) = table.get_mut(&prefix_id) {
                set.remove(&generation);
                if set.is_empty() {
                    table.remove(&prefix_id);
                }
            }
        }
    }

    /// Cancel every registration at the **exact** `id` and stop tracking
    /// that entry immediately.
    ///
    /// Work started in deeper scopes registered itself under this key too,
    /// so it is reached from here; its own removal guards strip the
    /// remaining prefix entries as it winds down. Cancelling an identifier
    /// with no live registration is a silent no-op.
    pub fn cancel(&self, id: &CancelId) {
        let mut table = self.cancellables.lock();
        Self::cancel_locked(&mut table, id);
    }

    /// Tear down a scope: cancel every identifier registered at exactly
    /// `scope`.
    ///
    /// Because registrations fan out to ancestor prefixes, one call at a
    /// popped scope reaches all work started at that scope or below it.
    pub fn cancel_scope(&self, scope: &ScopePath) {
        let mut table = self.cancellables.lock();
        let ids: Vec<CancelId> = table
            .keys()
            .filter(|id| id.scope() == scope)
            .cloned()
            .collect();
        if !ids.is_empty() {
            tracing::debug!(target: "tether::cancel", scope = %scope, ids = ids.len(), "tearing down scope");
        }
        for id in ids {
            Self::cancel_locked(&mut table, &id);
        }
    }

    /// True iff the exact `id` currently has a live entry.
    pub fn exists(&self, id: &CancelId) -> bool {
        self.cancellables.lock().contains_key(id)
    }

    /// True when nothing is registered anywhere.
    pub fn is_empty(&self) -> bool {
        self.cancellables.lock().is_empty()
    }

    fn insert_locked(table: &mut Table, id: &CancelId, handle: Arc<CancellationHandle>) {
        for prefix in id.scope().prefixes() {
            table
                .entry(id.with_scope(prefix))
                .or_default()
                .insert(handle.generation(), handle.clone());
        }
    }

    fn cancel_locked(table: &mut Table, id: &CancelId) {
        if let Some(set) = table.remove(id) {
            tracing::trace!(target: "tether::cancel", id = %id, handles = set.len(), "cancelling registrations");
            for handle in set.values() {
                // Fires a non-blocking signal; the cancelled work's own
                // removal guard cleans up its other prefix entries.
                handle.cancel();
            }
        }
    }
}

/// Removes one registration when dropped.
///
/// Attached to the state of every cancellable operation so that removal
/// happens exactly once on any exit path: completion, failure, explicit
/// cancellation, or the host dropping the work outright.
pub(crate) struct RegistrationGuard {
    registry: Arc<CancellablesRegistry>,
    id: CancelId,
    generation: u64,
}

impl RegistrationGuard {
    pub(crate) fn new(registry: Arc<CancellablesRegistry>, id: CancelId, generation: u64) -> Self {
        Self {
            registry,
            id,
            generation,
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tether_core::cancel::CancelKey;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestId {
        Timer,
        Load,
    }

    fn counting_handle(counter: &Arc<AtomicUsize>) -> Arc<CancellationHandle> {
        let counter = counter.clone();
        Arc::new(CancellationHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn insert_exists_cancel_scenario() {
        let registry = CancellablesRegistry::new();
        let id = CancelKey::new("timer").at(ScopePath::from(vec![0]));
        let fired = Arc::new(AtomicUsize::new(0));

        registry.insert(&id, counting_handle(&fired));
        assert!(registry.exists(&id));

        registry.cancel(&id);
        assert!(!registry.exists(&id));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Cancelling again is a silent no-op.
        registry.cancel(&id);
        assert!(!registry.exists(&id));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registration_fans_out_to_every_prefix() {
        let registry = CancellablesRegistry::new();
        let id = CancelKey::new(TestId::Timer).at(ScopePath::from(vec![1, 2, 3]));
        let fired = Arc::new(AtomicUsize::new(0));

        registry.insert(&id, counting_handle(&fired));
        for prefix in id.scope().prefixes() {
            assert!(registry.exists(&id.with_scope(prefix)));
        }

        // An ancestor cancellation reaches the deep registration.
        registry.cancel(&id.with_scope(ScopePath::from(vec![1])));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sibling_scope_cancellation_does_not_reach() {
        let registry = CancellablesRegistry::new();
        let id = CancelKey::new(TestId::Timer).at(ScopePath::from(vec![1, 2, 3]));
        let fired = Arc::new(AtomicUsize::new(0));

        registry.insert(&id, counting_handle(&fired));
        registry.cancel(&id.with_scope(ScopePath::from(vec![1, 2, 4])));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_strips_every_prefix_and_deletes_empty_entries() {
        let registry = CancellablesRegistry::new();
        let id = CancelKey::new(TestId::Load).at(ScopePath::from(vec![4, 5]));
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = counting_handle(&fired);
        let generation = handle.generation();

        registry.insert(&id, handle);
        registry.remove(&id, generation);

        assert!(registry.is_empty());
        // Removal is not cancellation.
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Double removal is a no-op.
        registry.remove(&id, generation);
        assert!(registry.is_empty());
    }

    #[test]
    fn distinct_identifiers_are_isolated() {
        let registry = CancellablesRegistry::new();
        let scope = ScopePath::from(vec![0]);
        let timer = CancelKey::new(TestId::Timer).at(scope.clone());
        let load = CancelKey::new(TestId::Load).at(scope);
        let timer_fired = Arc::new(AtomicUsize::new(0));
        let load_fired = Arc::new(AtomicUsize::new(0));

        registry.insert(&timer, counting_handle(&timer_fired));
        registry.insert(&load, counting_handle(&load_fired));

        registry.cancel(&timer);
        assert_eq!(timer_fired.load(Ordering::SeqCst), 1);
        assert_eq!(load_fired.load(Ordering::SeqCst), 0);
        assert!(registry.exists(&load));
    }

    #[test]
    fn register_with_cancels_old_before_building_new() {
        let registry = CancellablesRegistry::new();
        let id = CancelKey::new(TestId::Load).at(ScopePath::root());
        let old_cancelled = Arc::new(AtomicBool::new(false));

        let flag = old_cancelled.clone();
        registry.insert(
            &id,
            Arc::new(CancellationHandle::new(move || {
                flag.store(true, Ordering::SeqCst);
            })),
        );

        let observed = old_cancelled.clone();
        let new_handle = Arc::new(CancellationHandle::new(|| {}));
        let seen_at_make = registry.register_with(&id, true, || {
            // The old registration must already be cancelled by the time
            // the replacement is built.
            (new_handle.clone(), observed.load(Ordering::SeqCst))
        });

        assert!(seen_at_make);
        assert!(registry.exists(&id));
        assert!(!new_handle.is_cancelled());
    }

    #[test]
    fn register_without_cancel_in_flight_keeps_old() {
        let registry = CancellablesRegistry::new();
        let id = CancelKey::new(TestId::Load).at(ScopePath::root());
        let fired = Arc::new(AtomicUsize::new(0));

        registry.insert(&id, counting_handle(&fired));
        registry.register_with(&id, false, || (counting_handle(&fired), ()));

        registry.cancel(&id);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancel_scope_reaches_only_that_scope_key() {
        let registry = CancellablesRegistry::new();
        let popped = ScopePath::from(vec![7]);
        let deep = CancelKey::new(TestId::Timer).at(popped.child(1));
        let other = CancelKey::new(TestId::Load).at(ScopePath::from(vec![8]));
        let deep_fired = Arc::new(AtomicUsize::new(0));
        let other_fired = Arc::new(AtomicUsize::new(0));

        registry.insert(&deep, counting_handle(&deep_fired));
        registry.insert(&other, counting_handle(&other_fired));

        // The deep registration fanned out to `/7`, so tearing down `/7`
        // reaches it; the unrelated stack entry survives.
        registry.cancel_scope(&popped);
        assert_eq!(deep_fired.load(Ordering::SeqCst), 1);
        assert_eq!(other_fired.load(Ordering::SeqCst), 0);
        assert!(registry.exists(&other));
    }

    #[test]
    fn registration_guard_removes_on_drop() {
        let registry = Arc::new(CancellablesRegistry::new());
        let id = CancelKey::new(TestId::Timer).at(ScopePath::from(vec![2, 2]));
        let handle = Arc::new(CancellationHandle::new(|| {}));
        let generation = handle.generation();

        registry.insert(&id, handle);
        {
            let _guard = RegistrationGuard::new(registry.clone(), id.clone(), generation);
            assert!(registry.exists(&id));
        }
        assert!(registry.is_empty());
    }
}
