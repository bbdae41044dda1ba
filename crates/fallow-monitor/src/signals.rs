use std::sync::Arc;

use tokio::sync::watch;

/// Foreground/background visibility of the monitored view.
///
/// This capability is required: without it, inactivity-based pruning is
/// unavailable and the monitor refuses to start.
pub trait VisibilitySignal: Send + Sync {
    fn is_visible(&self) -> bool;
    /// Subscribe to visibility changes. The receiver's current value is
    /// the latest known visibility.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Current heap usage of the monitored application.
///
/// Best effort: a probe may exist yet have nothing to report.
pub trait MemoryProbe: Send + Sync {
    fn memory_mb(&self) -> Option<f64>;
}

/// Live node count of the monitored view tree.
pub trait NodeCountProbe: Send + Sync {
    fn node_count(&self) -> Option<u64>;
}

/// The signal capabilities available to a monitor.
///
/// Absent capabilities are a normal, expected case: memory and node
/// probes degrade that threshold to "never crossed", a missing
/// visibility signal disables the monitor entirely.
#[derive(Clone, Default)]
pub struct MonitorSignals {
    pub visibility: Option<Arc<dyn VisibilitySignal>>,
    pub memory: Option<Arc<dyn MemoryProbe>>,
    pub nodes: Option<Arc<dyn NodeCountProbe>>,
}

impl MonitorSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(mut self, signal: Arc<dyn VisibilitySignal>) -> Self {
        self.visibility = Some(signal);
        self
    }

    pub fn with_memory(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = Some(probe);
        self
    }

    pub fn with_nodes(mut self, probe: Arc<dyn NodeCountProbe>) -> Self {
        self.nodes = Some(probe);
        self
    }
}

impl std::fmt::Debug for MonitorSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSignals")
            .field("visibility", &self.visibility.is_some())
            .field("memory", &self.memory.is_some())
            .field("nodes", &self.nodes.is_some())
            .finish()
    }
}

/// Watch-channel backed [`VisibilitySignal`] driven by the host.
///
/// The host calls [`VisibilityState::set_visible`] from whatever platform
/// event tells it the view went fore/background.
#[derive(Clone)]
pub struct VisibilityState {
    sender: Arc<watch::Sender<bool>>,
}

impl VisibilityState {
    /// Starts visible.
    pub fn new() -> Self {
        Self::with_initial(true)
    }

    pub fn with_initial(visible: bool) -> Self {
        let (sender, _) = watch::channel(visible);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.sender.send_replace(visible);
    }
}

impl Default for VisibilityState {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilitySignal for VisibilityState {
    fn is_visible(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// [`MemoryProbe`] reading the process's resident set size.
///
/// Linux-only; elsewhere it reports nothing and the memory threshold is
/// simply never crossed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn memory_mb(&self) -> Option<f64> {
        current_rss_bytes().map(|bytes| bytes as f64 / (1024.0 * 1024.0))
    }
}

fn current_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = match std::fs::read_to_string("/proc/self/status") {
            Ok(status) => status,
            Err(err) => {
                // `/proc` may be missing in sandboxed environments; only log
                // unexpected filesystem errors.
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(
                        target = "fallow.monitor",
                        error = %err,
                        "failed to read /proc/self/status while sampling rss"
                    );
                }
                return None;
            }
        };
        for line in status.lines() {
            if let Some(rest) = line.trim_start().strip_prefix("VmRSS:") {
                let kb = rest.split_whitespace().next()?;
                return kb.parse::<u64>().ok().map(|kb| kb.saturating_mul(1024));
            }
        }
        None
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_state_round_trips() {
        let state = VisibilityState::new();
        assert!(state.is_visible());

        let rx = state.subscribe();
        state.set_visible(false);
        assert!(!state.is_visible());
        assert!(!*rx.borrow());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_probe_reports_positive_rss() {
        let probe = ProcessMemoryProbe::new();
        if let Some(mb) = probe.memory_mb() {
            assert!(mb > 0.0);
        }
    }
}
