use serde::Serialize;

/// Point-in-time view of the signals the monitor evaluates.
///
/// Recomputed on every poll tick and attached to every event; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// How long the view has been hidden, in milliseconds. Zero while
    /// visible or never hidden.
    pub inactive_for_ms: u64,
    /// Heap usage in megabytes, when the signal was available.
    pub memory_mb: Option<f64>,
    /// Live node count, when a DOM threshold is configured and the probe
    /// answered.
    pub dom_node_count: Option<u64>,
    /// Unix-epoch milliseconds of the last prune, if any.
    pub last_prune_at: Option<u64>,
    /// Unix-epoch milliseconds of the last rehydrate, if any.
    pub last_rehydrate_at: Option<u64>,
}
