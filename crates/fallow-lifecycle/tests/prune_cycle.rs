use std::sync::{Arc, Mutex};
use std::time::Duration;

use fallow_bind::BindingOptions;
use fallow_lifecycle::{hook, BoundaryConfig, ConfigError, LifecyclePhase, ViewBoundary};
use fallow_monitor::{MonitorSignals, VisibilityState};
use fallow_store::MemorySessionStore;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Let spawned monitor/bridge tasks observe the latest state.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Step paused time forward in poll-interval increments so every tick is
/// observed before the next one fires.
async fn advance_hidden(ticks: u32) {
    for _ in 0..ticks {
        tokio::time::advance(Duration::from_millis(10)).await;
        settle().await;
    }
}

fn signals() -> (VisibilityState, MonitorSignals) {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new().with_visibility(Arc::new(visibility.clone()));
    (visibility, signals)
}

fn quick_config() -> BoundaryConfig {
    BoundaryConfig::new("50ms").with_poll_interval(Duration::from_millis(10))
}

#[tokio::test(start_paused = true)]
async fn invalid_prune_after_is_a_hard_error() {
    let (_visibility, signals) = signals();
    let err = ViewBoundary::new(BoundaryConfig::new("soon"), signals).unwrap_err();
    assert!(matches!(err, ConfigError::PruneAfter(_)));
}

#[tokio::test(start_paused = true)]
async fn hidden_view_prunes_once_and_rehydrates_on_return() {
    init_tracing();
    let (visibility, signals) = signals();
    let boundary = ViewBoundary::new(quick_config(), signals).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    for key in ["release-subscriptions", "drop-caches"] {
        let order = order.clone();
        boundary.register_cleanup(
            key,
            hook(move || {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(key);
                    Ok(())
                }
            }),
        );
    }

    let filters = boundary.bind("filters", String::new(), BindingOptions::new());

    // Visible views never prune, no matter how long they sit.
    advance_hidden(12).await;
    assert_eq!(boundary.phase(), LifecyclePhase::Active);
    assert!(order.lock().unwrap().is_empty());

    filters.set("status:open".to_string());
    visibility.set_visible(false);
    settle().await;
    advance_hidden(6).await;

    assert_eq!(boundary.phase(), LifecyclePhase::Pruned);
    assert_eq!(
        *order.lock().unwrap(),
        vec!["release-subscriptions", "drop-caches"]
    );
    // The debounced write had not landed yet; prune flushed it.
    assert_eq!(
        boundary.store().get::<String>("filters"),
        Some("status:open".to_string())
    );
    assert!(boundary.metrics().last_prune_at.is_some());

    // Staying hidden must not prune again.
    advance_hidden(12).await;
    assert_eq!(order.lock().unwrap().len(), 2);

    // Another session wrote while we were pruned; rehydration picks it up.
    assert!(boundary.store().set("filters", &"status:closed".to_string()));

    visibility.set_visible(true);
    settle().await;

    assert_eq!(boundary.phase(), LifecyclePhase::Active);
    assert_eq!(filters.get(), "status:closed");
    assert!(boundary.metrics().last_rehydrate_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn each_hidden_period_gets_its_own_prune() {
    let (visibility, signals) = signals();
    let boundary = ViewBoundary::new(quick_config(), signals).unwrap();

    let prunes = Arc::new(Mutex::new(0u32));
    boundary.register_cleanup("count", {
        let prunes = prunes.clone();
        hook(move || {
            let prunes = prunes.clone();
            async move {
                *prunes.lock().unwrap() += 1;
                Ok(())
            }
        })
    });

    visibility.set_visible(false);
    settle().await;
    advance_hidden(8).await;
    assert_eq!(*prunes.lock().unwrap(), 1);

    visibility.set_visible(true);
    settle().await;
    assert_eq!(boundary.phase(), LifecyclePhase::Active);

    visibility.set_visible(false);
    settle().await;
    advance_hidden(8).await;
    assert_eq!(*prunes.lock().unwrap(), 2);
    assert_eq!(boundary.phase(), LifecyclePhase::Pruned);
}

#[tokio::test(start_paused = true)]
async fn force_rehydrate_works_while_still_hidden() {
    let (visibility, signals) = signals();
    let boundary = ViewBoundary::new(quick_config(), signals).unwrap();

    visibility.set_visible(false);
    settle().await;
    advance_hidden(6).await;
    assert_eq!(boundary.phase(), LifecyclePhase::Pruned);

    assert!(boundary.force_rehydrate().await);
    assert_eq!(boundary.phase(), LifecyclePhase::Active);
    assert!(boundary.metrics().last_rehydrate_at.is_some());

    assert!(!boundary.force_rehydrate().await);
}

#[tokio::test(start_paused = true)]
async fn quota_rejection_keeps_the_in_memory_value() {
    let (_visibility, signals) = signals();
    let config = quick_config().with_backend(Arc::new(MemorySessionStore::with_quota(32)));
    let boundary = ViewBoundary::new(config, signals).unwrap();

    let notes = boundary.bind("notes", String::new(), BindingOptions::new());
    notes.set("x".repeat(256));

    tokio::time::advance(Duration::from_millis(150)).await;
    settle().await;

    // The write was rejected by the quota but the caller never sees an
    // error; the value survives in memory.
    assert_eq!(notes.get(), "x".repeat(256));
    assert_eq!(boundary.store().get::<String>("notes"), None);
}

#[tokio::test(start_paused = true)]
async fn shutdown_detaches_bindings_and_stops_the_monitor() {
    let (visibility, signals) = signals();
    let boundary = ViewBoundary::new(quick_config(), signals).unwrap();
    let filters = boundary.bind("filters", 0u32, BindingOptions::new());

    assert!(boundary.monitor().is_running());
    boundary.shutdown();
    assert!(!boundary.monitor().is_running());

    filters.set(7);
    tokio::time::advance(Duration::from_millis(150)).await;
    settle().await;
    assert_eq!(boundary.store().get::<u32>("filters"), None);
    assert_eq!(filters.get(), 7);

    // Hiding after shutdown never prunes.
    visibility.set_visible(false);
    advance_hidden(12).await;
    assert_eq!(boundary.phase(), LifecyclePhase::Active);
}

#[tokio::test(start_paused = true)]
async fn missing_visibility_signal_degrades_to_a_plain_store() {
    let boundary = ViewBoundary::new(quick_config(), MonitorSignals::new()).unwrap();
    assert!(!boundary.monitor().is_running());

    let filters = boundary.bind("filters", 0u32, BindingOptions::new());
    filters.set(3);
    tokio::time::advance(Duration::from_millis(150)).await;
    settle().await;

    assert_eq!(boundary.store().get::<u32>("filters"), Some(3));
    assert_eq!(boundary.phase(), LifecyclePhase::Active);
}
