use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use fallow_bind::Restorable;
use fallow_core::now_millis;

use crate::phase::{LifecyclePhase, RenderState};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// User-supplied async hook run around transitions (pre-prune,
/// post-rehydrate). Errors are logged at the call site and never abort
/// the transition.
pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// A registered cleanup callback, invoked once per prune in registration
/// order.
pub type CleanupFn = Arc<dyn Fn() -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`LifecycleHook`] / [`CleanupFn`].
pub fn hook<F, Fut>(f: F) -> LifecycleHook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Hooks and timing for an [`Orchestrator`].
#[derive(Clone, Default)]
pub struct OrchestratorOptions {
    pub pre_prune: Option<LifecycleHook>,
    pub post_rehydrate: Option<LifecycleHook>,
    /// When set, rehydration holds this long in `Rehydrating` so a
    /// placeholder can render before the heavy subtree returns.
    pub placeholder_delay: Option<Duration>,
}

impl std::fmt::Debug for OrchestratorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorOptions")
            .field("pre_prune", &self.pre_prune.is_some())
            .field("post_rehydrate", &self.post_rehydrate.is_some())
            .field("placeholder_delay", &self.placeholder_delay)
            .finish()
    }
}

struct Inner {
    options: OrchestratorOptions,
    phase: Mutex<LifecyclePhase>,
    /// Set for the whole duration of a transition, including its awaits,
    /// so re-entrant triggers are ignored rather than queued.
    transitioning: AtomicBool,
    cleanups: Mutex<Vec<(String, CleanupFn)>>,
    restorables: Mutex<Vec<Arc<dyn Restorable>>>,
    last_prune_at: Mutex<Option<u64>>,
    last_rehydrate_at: Mutex<Option<u64>>,
}

/// The prune/rehydrate state machine for one view boundary.
///
/// Cheap to clone; clones share the same machine. There is no timeout on
/// user-supplied hooks or cleanups: a hung callback stalls the transition
/// indefinitely (the orchestrator cannot safely abandon user code
/// mid-teardown), so callers should keep cleanups short.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(options: OrchestratorOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                phase: Mutex::new(LifecyclePhase::Active),
                transitioning: AtomicBool::new(false),
                cleanups: Mutex::new(Vec::new()),
                restorables: Mutex::new(Vec::new()),
                last_prune_at: Mutex::new(None),
                last_rehydrate_at: Mutex::new(None),
            }),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.inner.phase.lock()
    }

    /// What the host should render for this boundary right now.
    ///
    /// While `Pruned` the boundary renders nothing; while `Rehydrating`
    /// it renders the placeholder if one was configured.
    pub fn render_state(&self) -> RenderState {
        match self.phase() {
            LifecyclePhase::Active => RenderState::Mounted,
            LifecyclePhase::Pruned => RenderState::Detached,
            LifecyclePhase::Rehydrating => {
                if self.inner.options.placeholder_delay.is_some() {
                    RenderState::Placeholder
                } else {
                    RenderState::Detached
                }
            }
        }
    }

    pub fn last_prune_at(&self) -> Option<u64> {
        *self.inner.last_prune_at.lock()
    }

    pub fn last_rehydrate_at(&self) -> Option<u64> {
        *self.inner.last_rehydrate_at.lock()
    }

    /// Register a cleanup callback under `key`.
    ///
    /// Callbacks run once per prune, in registration order, and stay
    /// registered until explicitly removed. Re-registering a key replaces
    /// the callback but keeps its position in the order.
    pub fn register_cleanup(&self, key: impl Into<String>, cleanup: CleanupFn) {
        let key = key.into();
        let mut cleanups = self.inner.cleanups.lock();
        match cleanups.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = cleanup,
            None => cleanups.push((key, cleanup)),
        }
    }

    /// Remove the cleanup registered under `key`. Idempotent.
    pub fn unregister_cleanup(&self, key: &str) {
        self.inner.cleanups.lock().retain(|(k, _)| k != key);
    }

    /// Attach a binding so prune flushes it and rehydrate restores it.
    pub fn attach(&self, restorable: Arc<dyn Restorable>) {
        self.inner.restorables.lock().push(restorable);
    }

    /// Detach every attached binding (boundary teardown).
    pub fn detach_all(&self) {
        for restorable in self.inner.restorables.lock().drain(..) {
            restorable.detach();
        }
    }

    /// `Active → Pruned`: run the pre-prune hook, then every cleanup in
    /// registration order (each awaited, failures logged, none skipped),
    /// flush bound values, then commit.
    ///
    /// Ignored (returns `false`) unless currently `Active` with no other
    /// transition in flight.
    pub async fn prune(&self) -> bool {
        let Some(_guard) = TransitionGuard::acquire(&self.inner.transitioning) else {
            tracing::debug!(
                target = "fallow.lifecycle",
                "transition in flight, prune trigger ignored"
            );
            return false;
        };
        if self.phase() != LifecyclePhase::Active {
            tracing::debug!(
                target = "fallow.lifecycle",
                phase = ?self.phase(),
                "prune trigger ignored outside Active"
            );
            return false;
        }

        if let Some(pre_prune) = &self.inner.options.pre_prune {
            if let Err(err) = pre_prune().await {
                tracing::warn!(
                    target = "fallow.lifecycle",
                    error = %err,
                    "pre-prune hook failed"
                );
            }
        }

        // Sequential on purpose: callback N may assume N-1 has completed.
        let cleanups = self.inner.cleanups.lock().clone();
        for (key, cleanup) in cleanups {
            if let Err(err) = cleanup().await {
                tracing::warn!(
                    target = "fallow.lifecycle",
                    key = %key,
                    error = %err,
                    "cleanup callback failed"
                );
            }
        }

        // Debounced binding writes must land before the subtree detaches.
        let restorables = self.inner.restorables.lock().clone();
        for restorable in restorables {
            restorable.flush();
        }

        *self.inner.phase.lock() = LifecyclePhase::Pruned;
        *self.inner.last_prune_at.lock() = Some(now_millis());
        tracing::info!(target = "fallow.lifecycle", "view pruned");
        true
    }

    /// `Pruned → Rehydrating → Active`: hold for the placeholder if one
    /// is configured, commit `Active`, restore bound values, then run the
    /// post-rehydrate hook.
    ///
    /// Ignored (returns `false`) unless currently `Pruned` with no other
    /// transition in flight. Also serves as the manual force-rehydrate.
    pub async fn rehydrate(&self) -> bool {
        let Some(_guard) = TransitionGuard::acquire(&self.inner.transitioning) else {
            tracing::debug!(
                target = "fallow.lifecycle",
                "transition in flight, rehydrate trigger ignored"
            );
            return false;
        };
        {
            let mut phase = self.inner.phase.lock();
            if *phase != LifecyclePhase::Pruned {
                tracing::debug!(
                    target = "fallow.lifecycle",
                    phase = ?*phase,
                    "rehydrate trigger ignored outside Pruned"
                );
                return false;
            }
            *phase = LifecyclePhase::Rehydrating;
        }

        if let Some(delay) = self.inner.options.placeholder_delay {
            // Give the placeholder a chance to render before the heavy
            // subtree returns.
            tokio::time::sleep(delay).await;
        }

        *self.inner.phase.lock() = LifecyclePhase::Active;

        let restorables = self.inner.restorables.lock().clone();
        for restorable in restorables {
            restorable.restore();
        }

        if let Some(post_rehydrate) = &self.inner.options.post_rehydrate {
            if let Err(err) = post_rehydrate().await {
                tracing::warn!(
                    target = "fallow.lifecycle",
                    error = %err,
                    "post-rehydrate hook failed"
                );
            }
        }

        *self.inner.last_rehydrate_at.lock() = Some(now_millis());
        tracing::info!(target = "fallow.lifecycle", "view rehydrated");
        true
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &self.phase())
            .field("options", &self.inner.options)
            .field("cleanups", &self.inner.cleanups.lock().len())
            .field("restorables", &self.inner.restorables.lock().len())
            .finish()
    }
}

/// RAII flag marking a transition in flight; cleared on drop so an early
/// return can never wedge the machine.
struct TransitionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TransitionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
