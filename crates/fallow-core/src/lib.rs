//! Core shared types for fallow.
//!
//! This crate is intentionally small and dependency-light.

mod duration;
mod panic;
mod time;

pub use duration::{parse_duration, DurationParseError, DurationSpec};
pub use panic::panic_message;
pub use time::now_millis;

/// Schema version recorded in every stored envelope.
///
/// Bump this when the envelope layout changes; readers treat envelopes
/// with an unknown version as absent.
pub const ENVELOPE_VERSION: &str = "1";
