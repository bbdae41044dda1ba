use std::sync::Arc;
use std::time::Duration;

use crate::DEFAULT_DEBOUNCE;

/// Per-binding behavior knobs.
///
/// All optional; the default binding persists any serde-serializable value
/// with a 100 ms debounce and no expiry.
#[derive(Clone)]
pub struct BindingOptions<T> {
    /// Discard stored values older than this on hydration.
    pub ttl: Option<Duration>,
    /// Reject stored values on hydration; rejected values fall back to the
    /// default.
    pub validate: Option<Arc<dyn Fn(&T) -> bool + Send + Sync>>,
    /// Invoked when a stored value is discarded because its TTL elapsed.
    pub on_expired: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Custom serializer; `None` from the closure marks the value
    /// unpersistable for this update.
    pub encode: Option<Arc<dyn Fn(&T) -> Option<serde_json::Value> + Send + Sync>>,
    /// Custom deserializer; `None` treats the stored value as absent.
    pub decode: Option<Arc<dyn Fn(serde_json::Value) -> Option<T> + Send + Sync>>,
    /// Delay between an update and its persisted write.
    pub debounce: Duration,
    /// Raise this binding's own log verbosity.
    pub debug: bool,
}

impl<T> BindingOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_validate(mut self, validate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn with_on_expired(mut self, on_expired: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_expired = Some(Arc::new(on_expired));
        self
    }

    pub fn with_encode(
        mut self,
        encode: impl Fn(&T) -> Option<serde_json::Value> + Send + Sync + 'static,
    ) -> Self {
        self.encode = Some(Arc::new(encode));
        self
    }

    pub fn with_decode(
        mut self,
        decode: impl Fn(serde_json::Value) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        self.decode = Some(Arc::new(decode));
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl<T> Default for BindingOptions<T> {
    fn default() -> Self {
        Self {
            ttl: None,
            validate: None,
            on_expired: None,
            encode: None,
            decode: None,
            debounce: DEFAULT_DEBOUNCE,
            debug: false,
        }
    }
}

impl<T> std::fmt::Debug for BindingOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingOptions")
            .field("ttl", &self.ttl)
            .field("validate", &self.validate.is_some())
            .field("on_expired", &self.on_expired.is_some())
            .field("encode", &self.encode.is_some())
            .field("decode", &self.decode.is_some())
            .field("debounce", &self.debounce)
            .field("debug", &self.debug)
            .finish()
    }
}
