//! Session-scoped key-value persistence for fallow.
//!
//! The backend is a deliberately narrow string store ([`SessionStore`]):
//! quota-limited, session-scoped, shared with other users of the same
//! store. [`StoreAdapter`] layers fallow's behavior on top of it:
//! namespacing, timestamped envelopes, usage accounting and TTL sweeps.
//!
//! Read failures of any kind (missing key, malformed JSON, unknown
//! envelope version) surface as "absent"; write failures (unserializable
//! value, quota rejection) surface as `false`. Neither path returns an
//! error to the caller: persistence degrades, the in-memory value wins.

mod adapter;
mod backend;
mod envelope;

pub use adapter::{StoreAdapter, StoreUsage, DEFAULT_CAPACITY_BYTES, DEFAULT_NAMESPACE};
pub use backend::{MemorySessionStore, SessionStore, StoreError};
pub use envelope::{EnvelopeMetadata, StoredEnvelope};
