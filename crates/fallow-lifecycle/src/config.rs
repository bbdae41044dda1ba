use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use fallow_core::{DurationParseError, DurationSpec};
use fallow_store::SessionStore;

use crate::orchestrator::LifecycleHook;
use crate::DEFAULT_PLACEHOLDER_DELAY;

/// Hard configuration errors raised at boundary construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid prune_after duration: {0}")]
    PruneAfter(#[from] DurationParseError),
}

/// Configuration surface for a [`crate::ViewBoundary`].
///
/// `prune_after` accepts the duration shorthand (`"30m"`, `"1h"`, `"2d"`)
/// or raw milliseconds; everything else is optional.
#[derive(Clone)]
pub struct BoundaryConfig {
    /// Hidden time after which the view is pruned.
    pub prune_after: DurationSpec,
    /// Memory threshold in megabytes; requires `enable_memory_monitoring`.
    pub max_memory_mb: Option<f64>,
    /// Master switch for the memory signal.
    pub enable_memory_monitoring: bool,
    /// Live node count threshold.
    pub max_dom_nodes: Option<u64>,
    /// Poll cadence while hidden.
    pub poll_interval: Duration,
    /// Hold in `Rehydrating` so a placeholder can render; `None` disables
    /// the placeholder entirely.
    pub placeholder_delay: Option<Duration>,
    /// Awaited before cleanup callbacks run at prune time.
    pub on_prune: Option<LifecycleHook>,
    /// Awaited after bound values have restored at rehydrate time.
    pub on_rehydrate: Option<LifecycleHook>,
    /// Raise the boundary's own log verbosity.
    pub debug: bool,
    /// Store namespace; entries outside it are never touched.
    pub namespace: String,
    /// Override the backing store (defaults to an in-process session store).
    pub backend: Option<Arc<dyn SessionStore>>,
}

impl BoundaryConfig {
    pub fn new(prune_after: impl Into<DurationSpec>) -> Self {
        Self {
            prune_after: prune_after.into(),
            ..Self::default()
        }
    }

    pub fn with_memory_threshold(mut self, max_memory_mb: f64) -> Self {
        self.max_memory_mb = Some(max_memory_mb);
        self.enable_memory_monitoring = true;
        self
    }

    pub fn with_max_dom_nodes(mut self, max_dom_nodes: u64) -> Self {
        self.max_dom_nodes = Some(max_dom_nodes);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Enable the placeholder with the default hold.
    pub fn with_placeholder(mut self) -> Self {
        self.placeholder_delay = Some(DEFAULT_PLACEHOLDER_DELAY);
        self
    }

    pub fn with_placeholder_delay(mut self, delay: Duration) -> Self {
        self.placeholder_delay = Some(delay);
        self
    }

    pub fn with_on_prune(mut self, on_prune: LifecycleHook) -> Self {
        self.on_prune = Some(on_prune);
        self
    }

    pub fn with_on_rehydrate(mut self, on_rehydrate: LifecycleHook) -> Self {
        self.on_rehydrate = Some(on_rehydrate);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn SessionStore>) -> Self {
        self.backend = Some(backend);
        self
    }
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            prune_after: DurationSpec::from("30m"),
            max_memory_mb: None,
            enable_memory_monitoring: false,
            max_dom_nodes: None,
            poll_interval: Duration::from_secs(10),
            placeholder_delay: None,
            on_prune: None,
            on_rehydrate: None,
            debug: false,
            namespace: fallow_store::DEFAULT_NAMESPACE.to_string(),
            backend: None,
        }
    }
}

impl std::fmt::Debug for BoundaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryConfig")
            .field("prune_after", &self.prune_after)
            .field("max_memory_mb", &self.max_memory_mb)
            .field("enable_memory_monitoring", &self.enable_memory_monitoring)
            .field("max_dom_nodes", &self.max_dom_nodes)
            .field("poll_interval", &self.poll_interval)
            .field("placeholder_delay", &self.placeholder_delay)
            .field("on_prune", &self.on_prune.is_some())
            .field("on_rehydrate", &self.on_rehydrate.is_some())
            .field("debug", &self.debug)
            .field("namespace", &self.namespace)
            .field("backend", &self.backend.is_some())
            .finish()
    }
}
