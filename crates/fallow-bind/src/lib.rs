//! Per-value persistence bindings.
//!
//! A [`BoundValue`] pairs one named value with the store: it hydrates from
//! a stored envelope on creation (honoring TTL and validation), debounces
//! writes so rapid updates coalesce into the last value, and re-runs the
//! hydration when the owning boundary rehydrates.

mod binding;
mod options;

pub use binding::{BoundValue, Restorable};
pub use options::BindingOptions;

/// Default debounce delay between an update and its persisted write.
pub const DEFAULT_DEBOUNCE: std::time::Duration = std::time::Duration::from_millis(100);
