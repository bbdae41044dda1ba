use std::time::Duration;

use serde::{Deserialize, Serialize};

use fallow_core::{now_millis, ENVELOPE_VERSION};

/// The unit of storage: a value wrapped with its write time and schema
/// version. Bare values are never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEnvelope {
    pub value: serde_json::Value,
    /// Write time, milliseconds since the Unix epoch. Drives TTL.
    pub timestamp: u64,
    pub version: String,
}

impl StoredEnvelope {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            timestamp: now_millis(),
            version: ENVELOPE_VERSION.to_string(),
        }
    }

    /// Time elapsed since the envelope was written.
    pub fn age(&self) -> Duration {
        Duration::from_millis(now_millis().saturating_sub(self.timestamp))
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

/// Envelope metadata without the payload, for callers that only need
/// freshness information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeMetadata {
    pub timestamp: u64,
    pub version: String,
    pub age: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_envelope_is_not_expired() {
        let envelope = StoredEnvelope::new(serde_json::json!({"n": 1}));
        assert!(!envelope.is_expired(Duration::from_secs(60)));
        assert_eq!(envelope.version, ENVELOPE_VERSION);
    }

    #[test]
    fn back_dated_envelope_expires() {
        let mut envelope = StoredEnvelope::new(serde_json::Value::Null);
        envelope.timestamp = now_millis().saturating_sub(10_000);
        assert!(envelope.is_expired(Duration::from_secs(5)));
        assert!(!envelope.is_expired(Duration::from_secs(15)));
    }
}
