use std::sync::{Arc, Mutex};
use std::time::Duration;

use fallow_monitor::{
    MemoryProbe, MetricsSnapshot, MonitorConfig, MonitorEvent, MonitorSignals, NodeCountProbe,
    ResourceMonitor, VisibilityState,
};

struct FixedMemory(Option<f64>);

impl MemoryProbe for FixedMemory {
    fn memory_mb(&self) -> Option<f64> {
        self.0
    }
}

struct FixedNodes(Option<u64>);

impl NodeCountProbe for FixedNodes {
    fn node_count(&self) -> Option<u64> {
        self.0
    }
}

fn test_config() -> MonitorConfig {
    MonitorConfig {
        max_inactivity: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
        ..MonitorConfig::default()
    }
}

fn recording_monitor(
    config: MonitorConfig,
    signals: MonitorSignals,
) -> (ResourceMonitor, Arc<Mutex<Vec<MonitorEvent>>>) {
    let monitor = ResourceMonitor::new(config, signals);
    let events: Arc<Mutex<Vec<MonitorEvent>>> = Arc::new(Mutex::new(Vec::new()));
    monitor.subscribe({
        let events = events.clone();
        Arc::new(move |event| events.lock().unwrap().push(event.clone()))
    });
    (monitor, events)
}

fn threshold_events(events: &[MonitorEvent]) -> Vec<MetricsSnapshot> {
    events
        .iter()
        .filter_map(|event| match event {
            MonitorEvent::ThresholdExceeded(snapshot) => Some(snapshot.clone()),
            MonitorEvent::MetricsUpdated(_) => None,
        })
        .collect()
}

/// Let the spawned poll task observe pending visibility changes.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn visible_view_never_crosses_thresholds() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new().with_visibility(Arc::new(visibility));
    let (monitor, events) = recording_monitor(test_config(), signals);

    monitor.start();
    settle().await;
    tokio::time::advance(Duration::from_secs(3600)).await;
    settle().await;

    assert!(events.lock().unwrap().is_empty());
    assert_eq!(monitor.metrics().inactive_for_ms, 0);
    monitor.stop();
}

#[tokio::test(start_paused = true)]
async fn hidden_past_max_inactivity_fires_exactly_once() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new().with_visibility(Arc::new(visibility.clone()));
    let (monitor, events) = recording_monitor(test_config(), signals);

    monitor.start();
    settle().await;
    visibility.set_visible(false);
    settle().await;

    tokio::time::advance(Duration::from_millis(60)).await;
    settle().await;

    let events = events.lock().unwrap();
    let crossed = threshold_events(&events);
    assert_eq!(crossed.len(), 1, "expected exactly one threshold event");
    assert!(crossed[0].inactive_for_ms >= 50);

    // Every tick also reported metrics.
    let updates = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::MetricsUpdated(_)))
        .count();
    assert!(updates >= crossed.len());
}

#[tokio::test(start_paused = true)]
async fn becoming_visible_resets_the_inactivity_timer() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new().with_visibility(Arc::new(visibility.clone()));
    let (monitor, events) = recording_monitor(test_config(), signals);

    monitor.start();
    settle().await;

    // Hide for a while, but come back before the threshold.
    visibility.set_visible(false);
    settle().await;
    tokio::time::advance(Duration::from_millis(40)).await;
    settle().await;
    visibility.set_visible(true);
    settle().await;
    assert!(threshold_events(&events.lock().unwrap()).is_empty());
    assert_eq!(monitor.metrics().inactive_for_ms, 0);

    // A fresh hidden period starts from zero and can fire again.
    visibility.set_visible(false);
    settle().await;
    tokio::time::advance(Duration::from_millis(60)).await;
    settle().await;
    assert_eq!(threshold_events(&events.lock().unwrap()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn memory_threshold_fires_when_probe_reports_over_limit() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new()
        .with_visibility(Arc::new(visibility.clone()))
        .with_memory(Arc::new(FixedMemory(Some(512.0))));
    let config = MonitorConfig {
        memory_monitoring: true,
        max_memory_mb: Some(256.0),
        ..test_config()
    };
    let (monitor, events) = recording_monitor(config, signals);

    monitor.start();
    settle().await;
    visibility.set_visible(false);
    settle().await;
    tokio::time::advance(Duration::from_millis(10)).await;
    settle().await;

    let crossed = threshold_events(&events.lock().unwrap());
    assert_eq!(crossed.len(), 1);
    assert_eq!(crossed[0].memory_mb, Some(512.0));
}

#[tokio::test(start_paused = true)]
async fn absent_memory_reading_degrades_to_no_memory_threshold() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new()
        .with_visibility(Arc::new(visibility.clone()))
        .with_memory(Arc::new(FixedMemory(None)));
    let config = MonitorConfig {
        memory_monitoring: true,
        max_memory_mb: Some(1.0),
        ..test_config()
    };
    let (monitor, events) = recording_monitor(config, signals);

    monitor.start();
    settle().await;
    visibility.set_visible(false);
    settle().await;
    tokio::time::advance(Duration::from_millis(30)).await;
    settle().await;

    // No memory reading, and inactivity has not elapsed: nothing fires.
    assert!(threshold_events(&events.lock().unwrap()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn dom_threshold_fires_and_probe_is_skipped_without_one() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new()
        .with_visibility(Arc::new(visibility.clone()))
        .with_nodes(Arc::new(FixedNodes(Some(20_000))));
    let config = MonitorConfig {
        max_dom_nodes: Some(10_000),
        ..test_config()
    };
    let (monitor, events) = recording_monitor(config, signals);

    monitor.start();
    settle().await;
    visibility.set_visible(false);
    settle().await;
    tokio::time::advance(Duration::from_millis(10)).await;
    settle().await;

    let crossed = threshold_events(&events.lock().unwrap());
    assert_eq!(crossed.len(), 1);
    assert_eq!(crossed[0].dom_node_count, Some(20_000));

    // Without a configured DOM threshold the probe is not consulted.
    let unthresholded = ResourceMonitor::new(
        test_config(),
        MonitorSignals::new()
            .with_visibility(Arc::new(VisibilityState::new()))
            .with_nodes(Arc::new(FixedNodes(Some(20_000)))),
    );
    assert_eq!(unthresholded.metrics().dom_node_count, None);
}

#[tokio::test(start_paused = true)]
async fn start_without_visibility_capability_disables_monitor() {
    let (monitor, events) = recording_monitor(
        test_config(),
        MonitorSignals::new().with_memory(Arc::new(FixedMemory(Some(999.0)))),
    );

    monitor.start();
    assert!(!monitor.is_running());
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new().with_visibility(Arc::new(visibility));
    let (monitor, _) = recording_monitor(test_config(), signals);

    monitor.stop();
    assert!(!monitor.is_running());

    monitor.start();
    monitor.start();
    assert!(monitor.is_running());

    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());
}

#[tokio::test(start_paused = true)]
async fn panicking_listener_does_not_stop_delivery() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new().with_visibility(Arc::new(visibility.clone()));
    let monitor = ResourceMonitor::new(test_config(), signals);

    monitor.subscribe(Arc::new(|_event| panic!("listener bug")));
    let events: Arc<Mutex<Vec<MonitorEvent>>> = Arc::new(Mutex::new(Vec::new()));
    monitor.subscribe({
        let events = events.clone();
        Arc::new(move |event| events.lock().unwrap().push(event.clone()))
    });

    monitor.start();
    settle().await;
    visibility.set_visible(false);
    settle().await;
    tokio::time::advance(Duration::from_millis(10)).await;
    settle().await;

    assert!(!events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn lifecycle_marks_show_up_in_snapshots() {
    let visibility = VisibilityState::new();
    let signals = MonitorSignals::new().with_visibility(Arc::new(visibility));
    let monitor = ResourceMonitor::new(test_config(), signals);

    assert_eq!(monitor.metrics().last_prune_at, None);
    monitor.mark_pruned();
    monitor.mark_rehydrated();
    let metrics = monitor.metrics();
    assert!(metrics.last_prune_at.is_some());
    assert!(metrics.last_rehydrate_at.is_some());
}
