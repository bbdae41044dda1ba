//! Prune/rehydrate orchestration for fallow.
//!
//! [`Orchestrator`] owns the `Active → Pruned → Rehydrating → Active`
//! state machine: it runs registered cleanup callbacks in order at prune
//! time, flips the mounted/unmounted boundary, and restores bound values
//! on rehydration. [`ViewBoundary`] is the assembled product: it wires a
//! configuration to a store adapter, a resource monitor and an
//! orchestrator, and bridges monitor events into transitions.

mod boundary;
mod config;
mod orchestrator;
mod phase;

pub use boundary::ViewBoundary;
pub use config::{BoundaryConfig, ConfigError};
pub use orchestrator::{
    hook, BoxFuture, CleanupFn, LifecycleHook, Orchestrator, OrchestratorOptions,
};
pub use phase::{LifecyclePhase, RenderState};

/// Placeholder hold applied during rehydration when a placeholder is
/// configured without an explicit delay.
pub const DEFAULT_PLACEHOLDER_DELAY: std::time::Duration = std::time::Duration::from_millis(50);
