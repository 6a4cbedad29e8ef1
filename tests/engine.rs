// SPDX-License-Identifier: GPL-3.0-only
//! Engine behavior against fake hardware drivers.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use brightness_engine::error::{ReadError, WriteError};
use brightness_engine::protocols::ddc_ci::to_physical;
use brightness_engine::protocols::{ControlChannel, ExternalLink, LinkDriver, PanelBacklight};
use brightness_engine::{
    CacheStore, DiscoveredDisplay, DisplayEnumerator, Engine, EngineConfig, EngineError,
};

#[derive(Default)]
struct ChannelState {
    current: u16,
    max: u16,
    fail_reads: bool,
    fail_writes: bool,
    write_latency: Duration,
    writes: Vec<(Instant, u16)>,
}

/// Control channel with scriptable reports and recorded writes.
#[derive(Clone)]
struct FakeChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl FakeChannel {
    fn new(current: u16, max: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                current,
                max,
                ..ChannelState::default()
            })),
        }
    }

    fn failing_reads() -> Self {
        let channel = Self::new(0, 100);
        channel.state.lock().unwrap().fail_reads = true;
        channel
    }

    fn with_write_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().write_latency = latency;
        self
    }

    fn set_report(&self, current: u16, max: u16) {
        let mut state = self.state.lock().unwrap();
        state.current = current;
        state.max = max;
    }

    fn writes(&self) -> Vec<(Instant, u16)> {
        self.state.lock().unwrap().writes.clone()
    }
}

impl ControlChannel for FakeChannel {
    fn read_luminance(&mut self) -> anyhow::Result<(u16, u16)> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            anyhow::bail!("simulated read failure");
        }
        Ok((state.current, state.max))
    }

    fn write_luminance(&mut self, value: u16) -> anyhow::Result<()> {
        let latency = self.state.lock().unwrap().write_latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            anyhow::bail!("simulated write failure");
        }
        state.current = value;
        state.writes.push((Instant::now(), value));
        Ok(())
    }
}

#[derive(Default)]
struct PanelState {
    value: f32,
    writes: Vec<f32>,
}

#[derive(Clone, Default)]
struct FakePanel {
    state: Arc<Mutex<PanelState>>,
}

impl FakePanel {
    fn at(value: f32) -> Self {
        let panel = Self::default();
        panel.state.lock().unwrap().value = value;
        panel
    }

    fn writes(&self) -> Vec<f32> {
        self.state.lock().unwrap().writes.clone()
    }
}

impl PanelBacklight for FakePanel {
    fn read(&mut self) -> Result<f32, ReadError> {
        Ok(self.state.lock().unwrap().value)
    }

    fn write(&mut self, value: f32) -> Result<(), WriteError> {
        let mut state = self.state.lock().unwrap();
        state.value = value;
        state.writes.push(value);
        Ok(())
    }
}

#[derive(Clone)]
enum FakeDisplay {
    Internal { id: String, panel: FakePanel },
    External { id: String, channel: FakeChannel },
    /// External display whose hardware matching failed.
    Unmatched { id: String },
}

#[derive(Clone)]
struct FakeEnumerator {
    displays: Arc<Mutex<Vec<FakeDisplay>>>,
}

impl FakeEnumerator {
    fn new(displays: Vec<FakeDisplay>) -> Self {
        Self {
            displays: Arc::new(Mutex::new(displays)),
        }
    }

    fn replace(&self, displays: Vec<FakeDisplay>) {
        *self.displays.lock().unwrap() = displays;
    }
}

impl DisplayEnumerator for FakeEnumerator {
    fn enumerate(&self) -> Vec<DiscoveredDisplay> {
        self.displays
            .lock()
            .unwrap()
            .iter()
            .map(|display| match display {
                FakeDisplay::Internal { id, panel } => DiscoveredDisplay {
                    id: id.clone(),
                    name: Some("Built-in Display".to_string()),
                    link: LinkDriver::Internal(Box::new(panel.clone())),
                },
                FakeDisplay::External { id, channel } => DiscoveredDisplay {
                    id: id.clone(),
                    name: Some(format!("Fake Monitor {id}")),
                    link: LinkDriver::External(Some(ExternalLink::new(Box::new(channel.clone())))),
                },
                FakeDisplay::Unmatched { id } => DiscoveredDisplay {
                    id: id.clone(),
                    name: None,
                    link: LinkDriver::External(None),
                },
            })
            .collect()
    }
}

fn internal(id: &str, panel: &FakePanel) -> FakeDisplay {
    FakeDisplay::Internal {
        id: id.to_string(),
        panel: panel.clone(),
    }
}

fn external(id: &str, channel: &FakeChannel) -> FakeDisplay {
    FakeDisplay::External {
        id: id.to_string(),
        channel: channel.clone(),
    }
}

/// Short timings so tests run fast; the delayed sync pass is pushed out of
/// every test's window.
fn test_config() -> EngineConfig {
    EngineConfig {
        write_gap_ms: 5,
        debounce_window_ms: 50,
        ramp_duration_ms: 200,
        delayed_sync_ms: 60_000,
        ..EngineConfig::default()
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn engine_with(displays: Vec<FakeDisplay>) -> Engine {
    init_tracing();
    Engine::new(
        FakeEnumerator::new(displays),
        test_config(),
        CacheStore::in_memory(),
    )
}

#[tokio::test]
async fn instant_request_updates_model_synchronously() {
    let channel = FakeChannel::new(30, 60);
    let engine = engine_with(vec![external("ddc-1", &channel)]);
    engine.refresh().await.unwrap();

    // Model reflects the request before any hardware write happens.
    engine.request_brightness("ddc-1", 0.42, false).await.unwrap();
    let displays = engine.list_displays().await;
    assert_eq!(displays.len(), 1);
    assert_eq!(displays[0].brightness, 0.42);
    assert!(channel.writes().is_empty());
}

#[tokio::test]
async fn unknown_display_is_rejected() {
    let engine = engine_with(vec![external("ddc-1", &FakeChannel::new(30, 60))]);
    engine.refresh().await.unwrap();

    let err = engine.request_brightness("ghost", 0.5, false).await;
    assert!(matches!(err, Err(EngineError::DisplayNotFound(_))));
}

#[tokio::test]
async fn near_equal_smooth_request_creates_no_ramp() {
    let panel = FakePanel::at(0.5);
    let engine = engine_with(vec![internal("panel", &panel)]);
    engine.refresh().await.unwrap();

    engine.request_brightness("panel", 0.505, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(panel.writes().is_empty());
    // The model still reflects the accepted request.
    assert_eq!(engine.list_displays().await[0].brightness, 0.505);
}

#[tokio::test]
async fn internal_ramp_is_monotonic_and_lands_on_target() {
    let panel = FakePanel::at(0.0);
    let engine = engine_with(vec![internal("panel", &panel)]);
    engine.refresh().await.unwrap();

    engine.request_brightness("panel", 1.0, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let writes = panel.writes();
    assert!(writes.len() > 5, "expected many ramp ticks, got {}", writes.len());
    assert_eq!(*writes.last().unwrap(), 1.0);
    for pair in writes.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-4, "ramp not monotonic: {pair:?}");
    }
}

#[tokio::test]
async fn superseding_ramp_continues_from_last_issued_value() {
    let panel = FakePanel::at(0.0);
    let engine = engine_with(vec![internal("panel", &panel)]);
    engine.refresh().await.unwrap();

    engine.request_brightness("panel", 1.0, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    engine.request_brightness("panel", 0.2, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let writes = panel.writes();
    assert!((writes.last().unwrap() - 0.2).abs() < 1e-6);

    // The second ramp must pick up where the first left off: no
    // discontinuity bigger than a generous bound on one tick's delta.
    for pair in writes.windows(2) {
        assert!(
            (pair[1] - pair[0]).abs() < 0.2,
            "visible jump between ticks: {pair:?}"
        );
    }
}

#[tokio::test]
async fn debounce_coalesces_burst_to_last_value() {
    let channel = FakeChannel::new(30, 60);
    let engine = engine_with(vec![external("ddc-1", &channel)]);
    engine.refresh().await.unwrap();

    for value in [0.1, 0.3, 0.5, 0.7, 0.9] {
        engine.request_brightness("ddc-1", value, false).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(250)).await;

    let writes = channel.writes();
    assert_eq!(writes.len(), 1, "burst must collapse to one write");
    assert_eq!(writes[0].1, to_physical(0.9));
}

#[tokio::test]
async fn write_queues_are_per_display_not_global() {
    let slow = Duration::from_millis(80);
    let a = FakeChannel::new(30, 60).with_write_latency(slow);
    let b = FakeChannel::new(30, 60).with_write_latency(slow);
    let engine = engine_with(vec![external("ddc-a", &a), external("ddc-b", &b)]);
    engine.refresh().await.unwrap();

    engine.request_brightness("ddc-a", 0.9, false).await.unwrap();
    engine.request_brightness("ddc-b", 0.8, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let writes_a = a.writes();
    let writes_b = b.writes();
    assert_eq!(writes_a.len(), 1);
    assert_eq!(writes_b.len(), 1);

    // If the two queues shared an exclusion scope, the second write would
    // finish a full write latency after the first.
    let gap = if writes_a[0].0 > writes_b[0].0 {
        writes_a[0].0 - writes_b[0].0
    } else {
        writes_b[0].0 - writes_a[0].0
    };
    assert!(gap < slow, "writes serialized across displays: gap {gap:?}");
}

#[tokio::test]
async fn external_ramp_writes_are_paced_by_the_queue() {
    // A tick rate far above what the write gap admits: if ramp ticks ever
    // reached the link directly instead of going through the queue, the
    // writes would land at tick cadence.
    init_tracing();
    let channel = FakeChannel::new(30, 60);
    let mut config = test_config();
    config.external_tick_hz = 200.0;
    config.write_gap_ms = 25;
    let engine = Engine::new(
        FakeEnumerator::new(vec![external("ddc-1", &channel)]),
        config,
        CacheStore::in_memory(),
    );
    engine.refresh().await.unwrap();

    engine.request_brightness("ddc-1", 1.0, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    let writes = channel.writes();
    assert_eq!(writes.last().unwrap().1, to_physical(1.0));
    assert!(
        writes.len() < 15,
        "too many hardware writes for a 200ms ramp: {}",
        writes.len()
    );
    for pair in writes.windows(2) {
        let gap = pair[1].0 - pair[0].0;
        assert!(gap >= Duration::from_millis(20), "write gap violated: {gap:?}");
    }
}

#[tokio::test]
async fn sync_normalizes_against_device_reported_max() {
    let channel = FakeChannel::new(30, 60);
    let engine = engine_with(vec![external("ddc-1", &channel)]);
    engine.refresh().await.unwrap();

    // Immediate post-discovery sync already ran: (30, 60) -> 0.5.
    assert_eq!(engine.list_displays().await[0].brightness, 0.5);

    // Hardware moved on its own (monitor OSD); sync absorbs it.
    channel.set_report(48, 60);
    engine.sync_all().await;
    let brightness = engine.list_displays().await[0].brightness;
    assert!((brightness - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn sync_skips_failed_and_zero_max_reads() {
    let failing = FakeChannel::failing_reads();
    let zero_max = FakeChannel::new(10, 0);
    let engine = engine_with(vec![
        external("ddc-fail", &failing),
        external("ddc-zero", &zero_max),
    ]);
    engine.refresh().await.unwrap();

    engine.request_brightness("ddc-fail", 0.7, false).await.unwrap();
    engine.request_brightness("ddc-zero", 0.7, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    engine.sync_all().await;
    for display in engine.list_displays().await {
        assert_eq!(display.brightness, 0.7, "sync corrupted {}", display.id);
    }
}

#[tokio::test]
async fn failed_write_keeps_requested_value_in_model() {
    let channel = FakeChannel::new(30, 60);
    channel.state.lock().unwrap().fail_writes = true;
    let engine = engine_with(vec![external("ddc-1", &channel)]);
    engine.refresh().await.unwrap();

    engine.request_brightness("ddc-1", 0.3, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(engine.list_displays().await[0].brightness, 0.3);
    assert!(channel.writes().is_empty());
}

#[tokio::test]
async fn unmatched_external_degrades_to_model_only() {
    let engine = engine_with(vec![FakeDisplay::Unmatched {
        id: "ux-1".to_string(),
    }]);
    engine.refresh().await.unwrap();

    let displays = engine.list_displays().await;
    assert_eq!(displays[0].name, "Display ux-1");

    engine.request_brightness("ux-1", 0.6, false).await.unwrap();
    engine.request_brightness("ux-1", 0.8, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.list_displays().await[0].brightness, 0.8);
}

#[tokio::test]
async fn external_initial_value_seeds_from_persisted_cache() {
    init_tracing();
    // Reads fail, so sync cannot correct the seed and we observe it.
    let channel = FakeChannel::failing_reads();
    let cache = CacheStore::in_memory();
    cache.set("ddc-1", 0.33);

    let engine = Engine::new(
        FakeEnumerator::new(vec![external("ddc-1", &channel)]),
        test_config(),
        cache,
    );
    engine.refresh().await.unwrap();
    assert_eq!(engine.list_displays().await[0].brightness, 0.33);
}

#[tokio::test]
async fn internal_initial_value_prefers_fresh_hardware_read() {
    init_tracing();
    let panel = FakePanel::at(0.77);
    let cache = CacheStore::in_memory();
    cache.set("panel", 0.11);

    let engine = Engine::new(
        FakeEnumerator::new(vec![internal("panel", &panel)]),
        test_config(),
        cache,
    );
    engine.refresh().await.unwrap();
    assert_eq!(engine.list_displays().await[0].brightness, 0.77);
}

#[tokio::test]
async fn discovery_replaces_registry_wholesale() {
    init_tracing();
    let old = FakeChannel::new(30, 60);
    let new = FakeChannel::new(30, 60);
    let enumerator = FakeEnumerator::new(vec![external("ddc-old", &old)]);
    let engine = Engine::new(enumerator.clone(), test_config(), CacheStore::in_memory());

    engine.refresh().await.unwrap();
    assert_eq!(engine.list_displays().await[0].id, "ddc-old");

    enumerator.replace(vec![external("ddc-new", &new)]);
    engine.refresh().await.unwrap();

    let displays = engine.list_displays().await;
    assert_eq!(displays.len(), 1);
    assert_eq!(displays[0].id, "ddc-new");
    assert!(matches!(
        engine.request_brightness("ddc-old", 0.5, false).await,
        Err(EngineError::DisplayNotFound(_))
    ));
}

#[tokio::test]
async fn empty_discovery_retains_last_registry() {
    init_tracing();
    let channel = FakeChannel::new(30, 60);
    let enumerator = FakeEnumerator::new(vec![external("ddc-1", &channel)]);
    let engine = Engine::new(enumerator.clone(), test_config(), CacheStore::in_memory());
    engine.refresh().await.unwrap();

    enumerator.replace(Vec::new());
    assert!(matches!(
        engine.refresh().await,
        Err(EngineError::DiscoveryFailed)
    ));
    assert_eq!(engine.list_displays().await.len(), 1);
    engine.request_brightness("ddc-1", 0.6, false).await.unwrap();
}

#[tokio::test]
async fn subscribers_are_pushed_model_changes() {
    let channel = FakeChannel::new(30, 60);
    let engine = engine_with(vec![external("ddc-1", &channel)]);
    engine.refresh().await.unwrap();

    let mut rx = engine.subscribe().await;
    rx.mark_unchanged();

    engine.request_brightness("ddc-1", 0.25, false).await.unwrap();
    rx.changed().await.unwrap();
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot[0].brightness, 0.25);
}

#[tokio::test]
async fn preset_routes_one_target_per_kind() {
    let panel = FakePanel::at(0.5);
    let channel = FakeChannel::new(30, 60);
    let engine = engine_with(vec![internal("panel", &panel), external("ddc-1", &channel)]);
    engine.refresh().await.unwrap();

    engine.apply_preset(0.2, 0.9).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let displays = engine.list_displays().await;
    let by_id = |id: &str| displays.iter().find(|d| d.id == id).unwrap().brightness;
    assert_eq!(by_id("panel"), 0.2);
    assert_eq!(by_id("ddc-1"), 0.9);

    // Both paths actually reached hardware, smoothly.
    assert!((panel.writes().last().unwrap() - 0.2).abs() < 1e-6);
    assert_eq!(channel.writes().last().unwrap().1, to_physical(0.9));
}

#[tokio::test]
async fn mirror_pushes_fresh_internal_value_to_externals() {
    let panel = FakePanel::at(0.5);
    let channel = FakeChannel::new(30, 60);
    let engine = engine_with(vec![internal("panel", &panel), external("ddc-1", &channel)]);
    engine.refresh().await.unwrap();

    // Brightness changed behind the engine's back; mirror must read fresh.
    panel.state.lock().unwrap().value = 0.65;
    engine.mirror_internal_to_external().await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let displays = engine.list_displays().await;
    let external_display = displays.iter().find(|d| d.id == "ddc-1").unwrap();
    assert_eq!(external_display.brightness, 0.65);
    assert_eq!(channel.writes().last().unwrap().1, to_physical(0.65));
}
