//! Execution context effects run under.

use crate::registry::CancellablesRegistry;
use std::fmt;
use std::sync::Arc;
use tether_core::effects::TaskSpawner;
use tether_core::scope::{ScopeMarker, ScopePath};

/// Everything an effect needs at start time: the shared cancellables
/// registry, the host's task spawner, and the scope path active where the
/// effect was produced.
///
/// The context is supplied by the store/runtime at the moment an effect is
/// run; the scope component is captured per nesting level with
/// [`descend`](EffectContext::descend). Cloning is cheap (two `Arc`s and a
/// path).
#[derive(Clone)]
pub struct EffectContext {
    registry: Arc<CancellablesRegistry>,
    spawner: Arc<dyn TaskSpawner>,
    scope: ScopePath,
}

impl EffectContext {
    /// Root context for an application's outermost scope.
    pub fn new(registry: Arc<CancellablesRegistry>, spawner: Arc<dyn TaskSpawner>) -> Self {
        Self {
            registry,
            spawner,
            scope: ScopePath::root(),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<CancellablesRegistry> {
        &self.registry
    }

    /// The host spawner.
    pub fn spawner(&self) -> &Arc<dyn TaskSpawner> {
        &self.spawner
    }

    /// The scope path effects started through this context register under.
    pub fn scope(&self) -> &ScopePath {
        &self.scope
    }

    /// The context of a scope nested one level below this one (a pushed
    /// screen, a presented sheet).
    pub fn descend(&self, marker: impl Into<ScopeMarker>) -> Self {
        Self {
            registry: self.registry.clone(),
            spawner: self.spawner.clone(),
            scope: self.scope.child(marker),
        }
    }

    /// The same services pinned to an explicit scope.
    pub fn at(&self, scope: ScopePath) -> Self {
        Self {
            registry: self.registry.clone(),
            spawner: self.spawner.clone(),
            scope,
        }
    }

    /// Tear down this context's scope: cancel every effect registered at
    /// this scope or any scope nested below it. Called when the scope's
    /// owner (e.g. a screen in a navigation stack) goes away.
    pub fn teardown(&self) {
        self.registry.cancel_scope(&self.scope);
    }
}

impl fmt::Debug for EffectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectContext")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
