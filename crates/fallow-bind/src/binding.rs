use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use fallow_store::StoreAdapter;

/// Hooks the owning boundary uses to coordinate bindings with the
/// prune/rehydrate cycle.
pub trait Restorable: Send + Sync {
    /// Re-run the restore-from-store logic (after a remount).
    fn restore(&self);
    /// Force any pending debounced write through immediately.
    fn flush(&self) -> bool;
    /// Tear the binding down; pending writes are dropped and later
    /// updates stay in memory only.
    fn detach(&self);
}

struct Inner<T> {
    key: String,
    store: StoreAdapter,
    options: crate::BindingOptions<T>,
    default: T,
    value: Mutex<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
    detached: AtomicBool,
}

/// One named value bound to the store.
///
/// Cheap to clone; clones share the same slot. Updates are persisted with
/// a debounce so rapid successive updates coalesce into the last value.
#[derive(Clone)]
pub struct BoundValue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> BoundValue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create the binding and hydrate it from the store.
    ///
    /// Absent, expired, invalid or undecodable stored values all resolve
    /// to `default`; the TTL path additionally fires `on_expired`.
    pub fn new(
        store: StoreAdapter,
        key: impl Into<String>,
        default: T,
        options: crate::BindingOptions<T>,
    ) -> Self {
        let key = key.into();
        let initial = hydrate(&store, &key, &default, &options);
        Self {
            inner: Arc::new(Inner {
                key,
                store,
                options,
                default,
                value: Mutex::new(initial),
                pending: Mutex::new(None),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Current in-memory value.
    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Replace the value and schedule a debounced write.
    pub fn set(&self, value: T) {
        *self.inner.value.lock() = value;
        self.schedule_write();
    }

    /// Compute the next value from the previous one and schedule a
    /// debounced write.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        {
            let mut value = self.inner.value.lock();
            let next = f(&value);
            *value = next;
        }
        self.schedule_write();
    }

    fn schedule_write(&self) {
        if self.inner.detached.load(Ordering::Relaxed) {
            tracing::debug!(
                target = "fallow.bind",
                key = %self.inner.key,
                "binding detached, keeping update in memory only"
            );
            return;
        }

        // One pending slot per binding: the newest update wins, the
        // previous timer is cancelled outright.
        let mut pending = self.inner.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let inner = self.inner.clone();
        // Anchor the deadline at schedule time, not at the task's first
        // poll, so the debounce is measured from the update itself.
        let deadline = tokio::time::Instant::now() + inner.options.debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            write_now(&inner);
        }));
    }
}

impl<T> Restorable for BoundValue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn restore(&self) {
        if self.inner.detached.load(Ordering::Relaxed) {
            return;
        }
        let restored = hydrate(
            &self.inner.store,
            &self.inner.key,
            &self.inner.default,
            &self.inner.options,
        );
        *self.inner.value.lock() = restored;
        if self.inner.options.debug {
            tracing::debug!(target = "fallow.bind", key = %self.inner.key, "binding restored");
        }
    }

    fn flush(&self) -> bool {
        if let Some(previous) = self.inner.pending.lock().take() {
            previous.abort();
        }
        if self.inner.detached.load(Ordering::Relaxed) {
            return false;
        }
        write_now(&self.inner)
    }

    fn detach(&self) {
        self.inner.detached.store(true, Ordering::Relaxed);
        if let Some(previous) = self.inner.pending.lock().take() {
            previous.abort();
        }
    }
}

impl<T> std::fmt::Debug for BoundValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundValue")
            .field("key", &self.inner.key)
            .field("detached", &self.inner.detached.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn hydrate<T>(
    store: &StoreAdapter,
    key: &str,
    default: &T,
    options: &crate::BindingOptions<T>,
) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Some(raw) = store.get::<serde_json::Value>(key) else {
        return default.clone();
    };

    if let Some(ttl) = options.ttl {
        if store.is_expired(key, ttl) {
            store.remove(key);
            tracing::debug!(target = "fallow.bind", key, "stored value expired, using default");
            if let Some(on_expired) = &options.on_expired {
                on_expired();
            }
            return default.clone();
        }
    }

    let decoded: Option<T> = match &options.decode {
        Some(decode) => decode(raw),
        None => serde_json::from_value(raw).ok(),
    };
    let Some(value) = decoded else {
        tracing::warn!(
            target = "fallow.bind",
            key,
            "stored value failed to decode, using default"
        );
        return default.clone();
    };

    if let Some(validate) = &options.validate {
        if !validate(&value) {
            store.remove(key);
            tracing::debug!(
                target = "fallow.bind",
                key,
                "stored value rejected by validator, using default"
            );
            return default.clone();
        }
    }

    value
}

fn write_now<T>(inner: &Inner<T>) -> bool
where
    T: Serialize + Clone,
{
    let value = inner.value.lock().clone();

    let encoded = match &inner.options.encode {
        Some(encode) => encode(&value),
        None => serde_json::to_value(&value)
            .map_err(|err| {
                tracing::warn!(
                    target = "fallow.bind",
                    key = %inner.key,
                    error = %err,
                    "update is not persistable, skipping write"
                );
            })
            .ok(),
    };
    let Some(encoded) = encoded else {
        if inner.options.encode.is_some() {
            tracing::warn!(
                target = "fallow.bind",
                key = %inner.key,
                "encoder declined update, skipping write"
            );
        }
        return false;
    };

    let ok = inner.store.set(&inner.key, &encoded);
    if ok && inner.options.debug {
        tracing::debug!(target = "fallow.bind", key = %inner.key, "binding persisted");
    }
    ok
}
