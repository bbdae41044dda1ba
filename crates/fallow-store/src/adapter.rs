use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use fallow_core::ENVELOPE_VERSION;

use crate::backend::SessionStore;
use crate::envelope::{EnvelopeMetadata, StoredEnvelope};

/// Namespace prefix applied to every key unless overridden.
pub const DEFAULT_NAMESPACE: &str = "fallow";

/// Conservative capacity estimate used for usage accounting.
///
/// Session stores rarely expose their real capacity; 5 MiB matches the
/// floor guaranteed by common backends, so reported percentages err on
/// the pessimistic side.
pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

/// Usage report for the adapter's namespace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreUsage {
    pub used_bytes: u64,
    pub available_bytes: u64,
    /// Capped at 100 even when usage exceeds the capacity estimate.
    pub percent: f64,
}

/// Namespaced, envelope-aware view of a [`SessionStore`].
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct StoreAdapter {
    backend: Arc<dyn SessionStore>,
    namespace: String,
    capacity_bytes: u64,
}

impl StoreAdapter {
    pub fn new(backend: Arc<dyn SessionStore>) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(backend: Arc<dyn SessionStore>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn read_envelope(&self, key: &str) -> Option<StoredEnvelope> {
        let raw = self.backend.get(&self.namespaced(key))?;
        let envelope: StoredEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(
                    target = "fallow.store",
                    key,
                    error = %err,
                    "malformed stored envelope, treating as absent"
                );
                return None;
            }
        };
        if envelope.version != ENVELOPE_VERSION {
            tracing::warn!(
                target = "fallow.store",
                key,
                version = %envelope.version,
                "unknown envelope version, treating as absent"
            );
            return None;
        }
        Some(envelope)
    }

    /// Read and decode a stored value.
    ///
    /// Missing keys, malformed envelopes and undecodable payloads are all
    /// reported as `None`; this never fails.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let envelope = self.read_envelope(key)?;
        match serde_json::from_value(envelope.value) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    target = "fallow.store",
                    key,
                    error = %err,
                    "stored value does not decode to the requested type"
                );
                None
            }
        }
    }

    /// Wrap `value` in a fresh envelope and write it.
    ///
    /// Returns `false` when the value cannot be serialized or the backend
    /// refuses the write (quota). The failure is logged, never raised.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(
                    target = "fallow.store",
                    key,
                    error = %err,
                    "value is not serializable, skipping write"
                );
                return false;
            }
        };
        let envelope = StoredEnvelope::new(json);
        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    target = "fallow.store",
                    key,
                    error = %err,
                    "envelope failed to serialize, skipping write"
                );
                return false;
            }
        };
        match self.backend.set(&self.namespaced(key), raw) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    target = "fallow.store",
                    key,
                    error = %err,
                    "backend rejected write"
                );
                false
            }
        }
    }

    /// Idempotent removal of one key.
    pub fn remove(&self, key: &str) {
        self.backend.remove(&self.namespaced(key));
    }

    /// Remove every entry under this adapter's namespace.
    ///
    /// Other data sharing the backend is untouched.
    pub fn clear(&self) {
        for key in self.namespaced_keys() {
            self.backend.remove(&key);
        }
    }

    /// Key+value byte usage across the namespace, against the fixed
    /// capacity estimate.
    pub fn usage(&self) -> StoreUsage {
        let used_bytes: u64 = self
            .namespaced_keys()
            .into_iter()
            .map(|key| {
                let value_len = self.backend.get(&key).map(|v| v.len()).unwrap_or(0);
                (key.len() + value_len) as u64
            })
            .sum();
        let available_bytes = self.capacity_bytes.saturating_sub(used_bytes);
        let percent = (used_bytes as f64 / self.capacity_bytes as f64 * 100.0).min(100.0);
        StoreUsage {
            used_bytes,
            available_bytes,
            percent,
        }
    }

    /// Envelope metadata for `key`, if present and well-formed.
    pub fn metadata(&self, key: &str) -> Option<EnvelopeMetadata> {
        let envelope = self.read_envelope(key)?;
        Some(EnvelopeMetadata {
            timestamp: envelope.timestamp,
            version: envelope.version.clone(),
            age: envelope.age(),
        })
    }

    /// Whether `key` holds an envelope older than `ttl`.
    ///
    /// Absent or malformed entries are not "expired", they are absent.
    pub fn is_expired(&self, key: &str, ttl: Duration) -> bool {
        self.read_envelope(key)
            .map(|envelope| envelope.is_expired(ttl))
            .unwrap_or(false)
    }

    /// Remove every namespaced entry whose envelope age exceeds `ttl`.
    ///
    /// Entries that no longer parse are removed too; they can never be
    /// read back, so keeping them only wastes quota. Returns the number
    /// of entries removed.
    pub fn cleanup_expired(&self, ttl: Duration) -> usize {
        let mut removed = 0;
        for key in self.namespaced_keys() {
            let Some(raw) = self.backend.get(&key) else {
                continue;
            };
            let expired = match serde_json::from_str::<StoredEnvelope>(&raw) {
                Ok(envelope) => envelope.is_expired(ttl),
                Err(_) => true,
            };
            if expired {
                self.backend.remove(&key);
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(
                target = "fallow.store",
                removed,
                ttl_ms = ttl.as_millis() as u64,
                "ttl sweep removed expired entries"
            );
        }
        removed
    }

    fn namespaced_keys(&self) -> Vec<String> {
        let prefix = format!("{}:", self.namespace);
        self.backend
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .collect()
    }
}

impl std::fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("namespace", &self.namespace)
            .field("capacity_bytes", &self.capacity_bytes)
            .finish_non_exhaustive()
    }
}
