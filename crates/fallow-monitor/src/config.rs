use std::time::Duration;

/// Thresholds and polling cadence for a [`crate::ResourceMonitor`].
///
/// Immutable per monitor instance; build a new monitor to reconfigure.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Hidden time after which the inactivity threshold is crossed.
    pub max_inactivity: Duration,
    /// Heap usage threshold in megabytes. Only evaluated when
    /// `memory_monitoring` is set and the host exposes a reading.
    pub max_memory_mb: Option<f64>,
    /// Live DOM/widget node count threshold. The probe is only consulted
    /// when this is set.
    pub max_dom_nodes: Option<u64>,
    /// Master switch for the memory signal.
    pub memory_monitoring: bool,
    /// Poll cadence while the view is hidden.
    pub poll_interval: Duration,
    /// Raise this monitor's own log verbosity.
    pub debug: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_inactivity: Duration::from_secs(30 * 60),
            max_memory_mb: None,
            max_dom_nodes: None,
            memory_monitoring: false,
            poll_interval: Duration::from_secs(10),
            debug: false,
        }
    }
}
