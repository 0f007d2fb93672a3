// Integration test for the façade lifecycle: init, listener delivery,
// teardown of in-flight cycles.

mod common;

use bluevery_core::{
    Bluevery, BlueveryError, BlueveryOptions, BroadcastListeners, DiscoveredPeripheral,
    InitOutcome, PeripheralEvent, ScanOptions, ScanningSettings, SessionState,
};
use common::{flush, flush_advance, GatedCore, NoopListeners, RecordingCore};
use std::sync::Arc;
use std::time::Duration;

fn scan_options(interval_length: u64, iterations: u32) -> ScanOptions {
    ScanOptions {
        scanning_settings: ScanningSettings::default(),
        interval_length,
        iterations,
    }
}

fn discovered(id: &str, name: &str) -> PeripheralEvent {
    PeripheralEvent::Discovered(DiscoveredPeripheral {
        id: id.to_string(),
        name: Some(name.to_string()),
        rssi: Some(-42),
    })
}

fn setup() -> (Bluevery, Arc<RecordingCore>, Arc<BroadcastListeners>) {
    let core = Arc::new(RecordingCore::new());
    let listeners = Arc::new(BroadcastListeners::new());
    let bluevery = Bluevery::new(core.clone(), listeners.clone(), BlueveryOptions::default());
    (bluevery, core, listeners)
}

#[tokio::test]
async fn test_init_subscribes_once() {
    let (bluevery, _core, listeners) = setup();
    assert!(!bluevery.check_is_initialized());

    assert_eq!(bluevery.init().await, InitOutcome::Initialized);
    assert_eq!(bluevery.init().await, InitOutcome::AlreadyInitialized);

    assert!(bluevery.check_is_initialized());
    assert_eq!(listeners.active_subscriptions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_listener_events_populate_discovered_set() {
    let (bluevery, _core, listeners) = setup();
    bluevery.init().await;
    let events = listeners.sender();

    let runner = bluevery.clone();
    let cycle = tokio::spawn(async move { runner.start_scan(scan_options(100, 2)).await });
    flush().await;

    events.send(discovered("AA:01", "Thermometer")).unwrap();
    events.send(discovered("AA:02", "Scale")).unwrap();
    events.send(discovered("AA:01", "Thermometer")).unwrap();
    flush_advance(100).await;

    let mut ids: Vec<String> = bluevery
        .discovered_peripherals()
        .into_iter()
        .map(|p| p.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["AA:01".to_string(), "AA:02".to_string()]);

    cycle.await.unwrap().expect("cycle succeeds");

    // The next cycle starts from an empty set
    let runner = bluevery.clone();
    let _next = tokio::spawn(async move { runner.start_scan(scan_options(100, 1)).await });
    flush().await;
    assert!(bluevery.discovered_peripherals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_in_flight_cycle() {
    let (bluevery, core, listeners) = setup();
    bluevery.init().await;

    let runner = bluevery.clone();
    let cycle = tokio::spawn(async move { runner.start_scan(scan_options(100, 5)).await });
    flush_advance(100).await;
    assert_eq!(core.scan_count(), 1);

    bluevery.stop_bluevery();
    assert_eq!(bluevery.get_state(), SessionState::default());
    assert_eq!(listeners.active_subscriptions(), 0);

    // The pending interval wait wakes up and bails without another burst
    flush_advance(10_000).await;
    let result = cycle.await.expect("task not cancelled");
    assert_eq!(
        result,
        Err(BlueveryError::ScanAborted {
            completed_bursts: 1
        })
    );
    assert_eq!(core.scan_count(), 1);
    assert!(!bluevery.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_cooldown_leaves_new_cycle_alone() {
    let (bluevery, core, _listeners) = setup();
    bluevery.init().await;

    let runner = bluevery.clone();
    let stale = tokio::spawn(async move { runner.start_scan(scan_options(0, 1)).await });
    flush().await;
    assert_eq!(core.scan_count(), 1);
    assert!(bluevery.is_scanning());

    bluevery.stop_bluevery();
    assert!(!bluevery.is_scanning());

    // Start over while the stale cooldown is still pending
    assert_eq!(bluevery.init().await, InitOutcome::Initialized);
    let runner = bluevery.clone();
    let fresh = tokio::spawn(async move { runner.start_scan(scan_options(0, 1)).await });
    flush().await;
    assert_eq!(core.scan_count(), 2);
    assert!(bluevery.is_scanning());

    flush_advance(500).await;
    assert!(bluevery.is_scanning());

    flush_advance(500).await;
    assert_eq!(
        stale.await.expect("task not cancelled"),
        Err(BlueveryError::ScanAborted {
            completed_bursts: 1
        })
    );
    fresh
        .await
        .expect("task not cancelled")
        .expect("fresh cycle succeeds");
    assert!(!bluevery.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_burst_aborts_after_it_returns() {
    let core = Arc::new(GatedCore::new());
    let bluevery = Bluevery::new(core.clone(), Arc::new(NoopListeners), BlueveryOptions::default());
    bluevery.init().await;

    let runner = bluevery.clone();
    let cycle = tokio::spawn(async move { runner.start_scan(scan_options(20, 3)).await });
    flush_advance(20).await;
    assert_eq!(core.scan_count(), 1);
    assert!(!cycle.is_finished());

    // Tear down while burst 1 is still in flight, then let it return
    bluevery.stop_bluevery();
    core.release();
    flush().await;

    assert!(cycle.is_finished());
    assert_eq!(
        cycle.await.expect("task not cancelled"),
        Err(BlueveryError::ScanAborted {
            completed_bursts: 1
        })
    );

    flush_advance(1_000).await;
    assert_eq!(core.scan_count(), 1);
    assert!(!bluevery.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_failing_burst_skips_cooldown() {
    let core = Arc::new(GatedCore::failing());
    let bluevery = Bluevery::new(core.clone(), Arc::new(NoopListeners), BlueveryOptions::default());
    bluevery.init().await;

    let start = tokio::time::Instant::now();
    let runner = bluevery.clone();
    let cycle = tokio::spawn(async move { runner.start_scan(scan_options(20, 3)).await });
    flush_advance(20).await;
    assert_eq!(core.scan_count(), 1);

    bluevery.stop_bluevery();
    core.release();
    flush().await;

    // No cooldown wait for an abandoned cycle
    assert!(cycle.is_finished());
    assert_eq!(start.elapsed(), Duration::from_millis(20));
    assert_eq!(
        cycle.await.expect("task not cancelled"),
        Err(BlueveryError::ScanAborted {
            completed_bursts: 0
        })
    );
    assert_eq!(core.scan_count(), 1);
}

#[tokio::test]
async fn test_start_scan_after_stop_requires_init() {
    let (bluevery, core, _listeners) = setup();
    bluevery.init().await;
    bluevery.stop_bluevery();

    let result = bluevery.start_scan(scan_options(0, 1)).await;
    assert_eq!(result, Err(BlueveryError::NotInitialized));
    assert_eq!(core.clear_count(), 0);
}

#[tokio::test]
async fn test_events_after_stop_are_ignored() {
    let (bluevery, _core, listeners) = setup();
    bluevery.init().await;
    let events = listeners.sender();

    bluevery.stop_bluevery();
    flush().await;

    // Nobody is subscribed any more
    assert!(events.send(discovered("AA:03", "Lamp")).is_err());
    assert!(bluevery.discovered_peripherals().is_empty());
}
