use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use fallow_core::{now_millis, panic_message};

use crate::config::MonitorConfig;
use crate::metrics::MetricsSnapshot;
use crate::signals::MonitorSignals;

/// Notification delivered to monitor listeners.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A configured threshold was crossed while the view was hidden.
    /// Fires at most once per hidden period.
    ThresholdExceeded(MetricsSnapshot),
    /// Fired on every poll tick so observers can render live stats.
    MetricsUpdated(MetricsSnapshot),
}

pub type MonitorListener = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct LifecycleMarks {
    last_prune_at: Option<u64>,
    last_rehydrate_at: Option<u64>,
}

struct Inner {
    config: MonitorConfig,
    signals: MonitorSignals,
    listeners: Mutex<Vec<MonitorListener>>,
    /// When the view last transitioned to hidden; `None` while visible.
    hidden_since: Mutex<Option<Instant>>,
    /// Latch so a hidden period produces at most one threshold event.
    threshold_fired: AtomicBool,
    marks: Mutex<LifecycleMarks>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Polls visibility/inactivity/memory/DOM-size signals on a timer and
/// fires [`MonitorEvent`]s when thresholds are crossed.
///
/// Threshold checks only run while the view is hidden: active use never
/// triggers pruning, no matter how long the view has been open.
///
/// Cheap to clone; clones share the same monitor.
#[derive(Clone)]
pub struct ResourceMonitor {
    inner: Arc<Inner>,
}

impl ResourceMonitor {
    pub fn new(config: MonitorConfig, signals: MonitorSignals) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                signals,
                listeners: Mutex::new(Vec::new()),
                hidden_since: Mutex::new(None),
                threshold_fired: AtomicBool::new(false),
                marks: Mutex::new(LifecycleMarks::default()),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Subscribe to monitor events.
    ///
    /// Delivery is fire-and-forget per listener: a panicking listener is
    /// caught and logged and never stops delivery to the rest.
    pub fn subscribe(&self, listener: MonitorListener) {
        self.inner.listeners.lock().push(listener);
    }

    /// Begin polling. Idempotent; a no-op (logged) when already running.
    ///
    /// Refuses to start when the visibility capability is absent: without
    /// it inactivity tracking is meaningless. The host keeps working, it
    /// just never prunes.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.is_some() {
            tracing::debug!(target = "fallow.monitor", "monitor already running");
            return;
        }
        let Some(visibility) = self.inner.signals.visibility.clone() else {
            tracing::warn!(
                target = "fallow.monitor",
                "visibility signal unavailable, monitor disabled"
            );
            return;
        };

        let inner = self.inner.clone();
        let mut rx = visibility.subscribe();
        *task = Some(tokio::spawn(async move {
            loop {
                let visible = *rx.borrow_and_update();
                if visible {
                    *inner.hidden_since.lock() = None;
                    inner.threshold_fired.store(false, Ordering::Relaxed);
                    if rx.changed().await.is_err() {
                        return;
                    }
                    continue;
                }

                {
                    let mut hidden_since = inner.hidden_since.lock();
                    if hidden_since.is_none() {
                        *hidden_since = Some(Instant::now());
                    }
                }
                if inner.config.debug {
                    tracing::debug!(target = "fallow.monitor", "view hidden, polling started");
                }

                // First check one full interval after hiding, then steadily.
                let start = Instant::now() + inner.config.poll_interval;
                let mut ticker = tokio::time::interval_at(start, inner.config.poll_interval);
                loop {
                    tokio::select! {
                        changed = rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            break;
                        }
                        _ = ticker.tick() => {
                            poll_once(&inner);
                        }
                    }
                }
            }
        }));
        tracing::debug!(target = "fallow.monitor", "monitor started");
    }

    /// Stop polling. Idempotent; a no-op when not running.
    pub fn stop(&self) {
        let mut task = self.inner.task.lock();
        match task.take() {
            Some(handle) => {
                handle.abort();
                *self.inner.hidden_since.lock() = None;
                self.inner.threshold_fired.store(false, Ordering::Relaxed);
                tracing::debug!(target = "fallow.monitor", "monitor stopped");
            }
            None => {
                tracing::debug!(target = "fallow.monitor", "monitor not running");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.task.lock().is_some()
    }

    /// Current metrics, computed on demand.
    pub fn metrics(&self) -> MetricsSnapshot {
        snapshot(&self.inner)
    }

    /// Record that a prune just happened (reflected in snapshots).
    pub fn mark_pruned(&self) {
        self.inner.marks.lock().last_prune_at = Some(now_millis());
    }

    /// Record that a rehydrate just happened (reflected in snapshots).
    pub fn mark_rehydrated(&self) {
        self.inner.marks.lock().last_rehydrate_at = Some(now_millis());
    }
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("config", &self.inner.config)
            .field("signals", &self.inner.signals)
            .field("running", &self.is_running())
            .finish()
    }
}

fn snapshot(inner: &Inner) -> MetricsSnapshot {
    let inactive_for_ms = inner
        .hidden_since
        .lock()
        .map(|since| since.elapsed().as_millis() as u64)
        .unwrap_or(0);

    let memory_mb = if inner.config.memory_monitoring {
        inner.signals.memory.as_ref().and_then(|p| p.memory_mb())
    } else {
        None
    };

    // Counting nodes can be expensive; skip unless a threshold asked for it.
    let dom_node_count = if inner.config.max_dom_nodes.is_some() {
        inner.signals.nodes.as_ref().and_then(|p| p.node_count())
    } else {
        None
    };

    let marks = *inner.marks.lock();
    MetricsSnapshot {
        inactive_for_ms,
        memory_mb,
        dom_node_count,
        last_prune_at: marks.last_prune_at,
        last_rehydrate_at: marks.last_rehydrate_at,
    }
}

fn threshold_crossed(inner: &Inner, snapshot: &MetricsSnapshot) -> bool {
    if snapshot.inactive_for_ms >= inner.config.max_inactivity.as_millis() as u64 {
        return true;
    }
    if inner.config.memory_monitoring {
        if let (Some(max), Some(mb)) = (inner.config.max_memory_mb, snapshot.memory_mb) {
            if mb >= max {
                return true;
            }
        }
    }
    if let (Some(max), Some(count)) = (inner.config.max_dom_nodes, snapshot.dom_node_count) {
        if count >= max {
            return true;
        }
    }
    false
}

fn poll_once(inner: &Inner) {
    let snapshot = snapshot(inner);
    if inner.config.debug {
        tracing::debug!(
            target = "fallow.monitor",
            inactive_for_ms = snapshot.inactive_for_ms,
            memory_mb = snapshot.memory_mb,
            dom_node_count = snapshot.dom_node_count,
            "poll tick"
        );
    }
    dispatch(inner, &MonitorEvent::MetricsUpdated(snapshot.clone()));

    if threshold_crossed(inner, &snapshot)
        && !inner.threshold_fired.swap(true, Ordering::Relaxed)
    {
        tracing::info!(
            target = "fallow.monitor",
            inactive_for_ms = snapshot.inactive_for_ms,
            memory_mb = snapshot.memory_mb,
            dom_node_count = snapshot.dom_node_count,
            "threshold exceeded"
        );
        dispatch(inner, &MonitorEvent::ThresholdExceeded(snapshot));
    }
}

fn dispatch(inner: &Inner, event: &MonitorEvent) {
    let listeners = inner.listeners.lock().clone();
    for listener in listeners {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
            tracing::warn!(
                target = "fallow.monitor",
                panic = %panic_message(&*panic),
                "monitor listener panicked"
            );
        }
    }
}
