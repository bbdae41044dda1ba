//! Inactivity and resource monitoring for fallow.
//!
//! [`ResourceMonitor`] polls environmental signals while the view is
//! hidden and notifies listeners when a configured threshold is crossed.
//! Signals are capabilities: visibility is required for the monitor to
//! start at all, memory and DOM-size probes are optional and may return
//! nothing on hosts that cannot provide them.

mod config;
mod metrics;
mod monitor;
mod signals;

pub use config::MonitorConfig;
pub use metrics::MetricsSnapshot;
pub use monitor::{MonitorEvent, MonitorListener, ResourceMonitor};
pub use signals::{
    MemoryProbe, MonitorSignals, NodeCountProbe, ProcessMemoryProbe, VisibilitySignal,
    VisibilityState,
};
