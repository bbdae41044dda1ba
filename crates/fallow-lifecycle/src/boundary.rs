use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use fallow_bind::{BindingOptions, BoundValue};
use fallow_monitor::{
    MetricsSnapshot, MonitorConfig, MonitorEvent, MonitorSignals, ResourceMonitor,
};
use fallow_store::{MemorySessionStore, StoreAdapter, StoreUsage};

use crate::config::{BoundaryConfig, ConfigError};
use crate::orchestrator::{CleanupFn, Orchestrator, OrchestratorOptions};
use crate::phase::{LifecyclePhase, RenderState};

/// One mounted provider boundary: store, monitor, orchestrator and
/// bindings wired together.
///
/// Construction resolves the configuration (hard error on a bad
/// `prune_after`), starts the monitor, and spawns the bridge task that
/// turns threshold events into prunes and visibility returns into
/// rehydrations. Exactly one boundary exists per mounted provider; drop
/// it (or call [`ViewBoundary::shutdown`]) when the provider unmounts.
pub struct ViewBoundary {
    store: StoreAdapter,
    monitor: ResourceMonitor,
    orchestrator: Orchestrator,
    bridge: Mutex<Option<JoinHandle<()>>>,
}

impl ViewBoundary {
    pub fn new(config: BoundaryConfig, signals: MonitorSignals) -> Result<Self, ConfigError> {
        let prune_after = config.prune_after.resolve()?;

        let backend = config
            .backend
            .clone()
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        let store = StoreAdapter::with_namespace(backend, config.namespace.clone());

        let monitor = ResourceMonitor::new(
            MonitorConfig {
                max_inactivity: prune_after,
                max_memory_mb: config.max_memory_mb,
                max_dom_nodes: config.max_dom_nodes,
                memory_monitoring: config.enable_memory_monitoring,
                poll_interval: config.poll_interval,
                debug: config.debug,
            },
            signals.clone(),
        );

        let orchestrator = Orchestrator::new(OrchestratorOptions {
            pre_prune: config.on_prune.clone(),
            post_rehydrate: config.on_rehydrate.clone(),
            placeholder_delay: config.placeholder_delay,
        });

        let bridge = spawn_bridge(&monitor, &orchestrator, &signals);
        monitor.start();

        Ok(Self {
            store,
            monitor,
            orchestrator,
            bridge: Mutex::new(Some(bridge)),
        })
    }

    /// Bind a named value to the store under this boundary.
    ///
    /// The binding hydrates immediately and re-hydrates on every
    /// rehydration of the boundary.
    pub fn bind<T>(
        &self,
        key: impl Into<String>,
        default: T,
        options: BindingOptions<T>,
    ) -> BoundValue<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let binding = BoundValue::new(self.store.clone(), key, default, options);
        self.orchestrator.attach(Arc::new(binding.clone()));
        binding
    }

    /// Register a cleanup callback; see [`Orchestrator::register_cleanup`].
    pub fn register_cleanup(&self, key: impl Into<String>, cleanup: CleanupFn) {
        self.orchestrator.register_cleanup(key, cleanup);
    }

    /// Remove a cleanup callback. Idempotent.
    pub fn unregister_cleanup(&self, key: &str) {
        self.orchestrator.unregister_cleanup(key);
    }

    /// Manually trigger rehydration; a no-op unless currently pruned.
    pub async fn force_rehydrate(&self) -> bool {
        let rehydrated = self.orchestrator.rehydrate().await;
        if rehydrated {
            self.monitor.mark_rehydrated();
        }
        rehydrated
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.orchestrator.phase()
    }

    pub fn render_state(&self) -> RenderState {
        self.orchestrator.render_state()
    }

    /// Current monitor metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.monitor.metrics()
    }

    /// Current store usage for this boundary's namespace.
    pub fn usage(&self) -> StoreUsage {
        self.store.usage()
    }

    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn monitor(&self) -> &ResourceMonitor {
        &self.monitor
    }

    /// Stop monitoring, stop the bridge and detach all bindings.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.monitor.stop();
        if let Some(bridge) = self.bridge.lock().take() {
            bridge.abort();
        }
        self.orchestrator.detach_all();
    }
}

impl Drop for ViewBoundary {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ViewBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewBoundary")
            .field("phase", &self.phase())
            .field("store", &self.store)
            .field("monitor", &self.monitor)
            .finish()
    }
}

/// Map monitor events onto orchestrator transitions.
///
/// Threshold events arrive through a channel because monitor listeners
/// are synchronous while transitions are async; visibility returns are
/// watched directly.
fn spawn_bridge(
    monitor: &ResourceMonitor,
    orchestrator: &Orchestrator,
    signals: &MonitorSignals,
) -> JoinHandle<()> {
    let (prune_tx, mut prune_rx) = mpsc::unbounded_channel::<()>();
    monitor.subscribe(Arc::new(move |event| {
        if let MonitorEvent::ThresholdExceeded(_) = event {
            let _ = prune_tx.send(());
        }
    }));

    let monitor = monitor.clone();
    let orchestrator = orchestrator.clone();
    let visibility_rx = signals.visibility.as_ref().map(|v| v.subscribe());

    tokio::spawn(async move {
        match visibility_rx {
            Some(mut rx) => loop {
                tokio::select! {
                    trigger = prune_rx.recv() => {
                        if trigger.is_none() {
                            return;
                        }
                        if orchestrator.prune().await {
                            monitor.mark_pruned();
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let visible = *rx.borrow_and_update();
                        if visible && orchestrator.phase() == LifecyclePhase::Pruned {
                            if orchestrator.rehydrate().await {
                                monitor.mark_rehydrated();
                            }
                        }
                    }
                }
            },
            // Without a visibility signal the monitor never starts, but a
            // host-driven store/orchestrator still works; keep draining so
            // a manual monitor listener cannot wedge the channel.
            None => {
                while prune_rx.recv().await.is_some() {
                    if orchestrator.prune().await {
                        monitor.mark_pruned();
                    }
                }
            }
        }
    })
}
