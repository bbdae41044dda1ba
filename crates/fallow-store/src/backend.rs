use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

/// Error returned by [`SessionStore::set`].
///
/// The adapter swallows these (logging them and reporting `false` to its
/// caller); they exist so backends can distinguish why a write was refused.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

/// The session-scoped string store boundary.
///
/// Implementations wrap whatever the host gives us: browser session
/// storage behind a bridge, an in-process map, a scratch file. Contract:
/// string keys to string values, last write wins, no durability promise
/// past the end of the session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str);
    /// All keys currently present, in no particular order.
    fn keys(&self) -> Vec<String>;
}

/// In-process [`SessionStore`] with an optional byte quota.
///
/// The default backend, and the way tests force quota rejection.
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: None,
        }
    }

    /// A store that rejects writes once key+value bytes would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes(entries: &HashMap<String, String>) -> u64 {
        entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota_bytes {
            // The entry being overwritten frees its bytes.
            let existing = entries.get(key).map(|v| (key.len() + v.len()) as u64);
            let used = Self::used_bytes(&entries) - existing.unwrap_or(0);
            let needed = (key.len() + value.len()) as u64;
            if used + needed > quota {
                return Err(StoreError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_rejects_and_preserves_existing_value() {
        let store = MemorySessionStore::with_quota(16);
        store.set("k", "12345".to_string()).unwrap();

        let err = store.set("other", "0123456789abcdef".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert_eq!(store.get("k").as_deref(), Some("12345"));
        assert_eq!(store.get("other"), None);
    }

    #[test]
    fn overwrite_releases_old_bytes() {
        let store = MemorySessionStore::with_quota(10);
        store.set("k", "123456789".to_string()).unwrap();
        // Same key, same size: fits because the old value is replaced.
        store.set("k", "abcdefghi".to_string()).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("abcdefghi"));
    }
}
