// SPDX-License-Identifier: GPL-3.0-only
//! Engine assembly and public API
//!
//! [`Engine`] owns the device registry, the brightness model, the
//! per-display write queues and ramp sessions, and the persisted cache.
//! The presentation layer interacts with displays exclusively through
//! this type.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, watch};

use crate::cache::CacheStore;
use crate::config::EngineConfig;
use crate::discovery::{DisplayEnumerator, PlatformEnumerator};
use crate::error::EngineError;
use crate::gate::DebounceGate;
use crate::hotplug::HotplugSubscription;
use crate::model::{BrightnessModel, Display, DisplayId, DisplayKind};
use crate::ramp::{self, RampSession, RampSpec};
use crate::registry::{Registry, RegistryEntry, SharedLink};
use crate::serializer::WriteQueue;
use crate::sync;

/// Last-known-brightness cache: the most recently *issued* value per
/// display, updated optimistically before every hardware write and
/// authoritatively after every successful read. Ramps start from here so
/// a ramp superseding another mid-flight begins where the old one left
/// off.
pub(crate) type IssuedCache = Arc<StdMutex<HashMap<DisplayId, f32>>>;

/// Policy value for a display whose brightness cannot be determined.
/// Never block the caller on unreadable hardware.
pub(crate) const UNKNOWN_BRIGHTNESS: f32 = 0.5;

/// How long to let hardware settle after a hot-plug burst before
/// rediscovering.
const HOTPLUG_SETTLE: Duration = Duration::from_millis(1000);

struct Writer {
    queue: Arc<WriteQueue>,
    gate: DebounceGate,
}

pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) model: RwLock<BrightnessModel>,
    pub(crate) issued: IssuedCache,
    pub(crate) cache: CacheStore,
    writers: StdMutex<HashMap<DisplayId, Writer>>,
    ramps: StdMutex<HashMap<DisplayId, RampSession>>,
    enumerator: Box<dyn DisplayEnumerator>,
}

pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(
        enumerator: impl DisplayEnumerator,
        config: EngineConfig,
        cache: CacheStore,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: RwLock::new(Registry::default()),
                model: RwLock::new(BrightnessModel::new()),
                issued: Arc::new(StdMutex::new(HashMap::new())),
                cache,
                writers: StdMutex::new(HashMap::new()),
                ramps: StdMutex::new(HashMap::new()),
                enumerator: Box::new(enumerator),
            }),
        }
    }

    /// Engine wired to the real platform, with config and cache loaded
    /// from their default locations.
    pub fn with_defaults() -> Self {
        Self::new(
            PlatformEnumerator,
            EngineConfig::load_default(),
            CacheStore::open_default(),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Push notification of model changes; each message is a full
    /// snapshot.
    pub async fn subscribe(&self) -> watch::Receiver<Vec<Display>> {
        self.shared.model.read().await.subscribe()
    }

    pub async fn list_displays(&self) -> Vec<Display> {
        self.shared.model.read().await.snapshot()
    }

    /// Run a discovery pass: enumerate, rebuild the registry atomically,
    /// then sync immediately and once more after the configured delay.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        refresh_shared(&self.shared).await
    }

    /// Reconcile the model with hardware state on demand.
    pub async fn sync_all(&self) {
        sync::sync_all(&self.shared).await;
    }

    /// Request a brightness change.
    ///
    /// The model reflects `value` synchronously, independent of hardware
    /// success. `smooth` selects a ramped transition (presets, large
    /// programmatic jumps); instant requests (slider drags) go through
    /// the debounce gate on the external path and straight to hardware on
    /// the internal path.
    pub async fn request_brightness(
        &self,
        id: &str,
        value: f32,
        smooth: bool,
    ) -> Result<(), EngineError> {
        let value = value.clamp(0.0, 1.0);
        let (kind, link) = {
            let registry = self.shared.registry.read().await;
            match registry.get(id) {
                Some(entry) => (entry.kind, entry.link.clone()),
                None => return Err(EngineError::DisplayNotFound(id.to_string())),
            }
        };

        self.shared.model.write().await.set_brightness(id, value);
        self.shared.cache.set(id, value);

        if smooth {
            self.start_ramp(id, kind, link, value);
            return Ok(());
        }

        // An instant write cancels the display's in-flight ramp.
        cancel_ramp(&self.shared, id);
        self.shared
            .issued
            .lock()
            .unwrap()
            .insert(id.to_string(), value);

        match kind {
            DisplayKind::Internal => {
                if let Err(err) = link.lock().await.write(value) {
                    warn!("internal write of {value:.3} failed: {err}");
                }
            }
            DisplayKind::External => {
                let gated = {
                    let writers = self.shared.writers.lock().unwrap();
                    match writers.get(id) {
                        Some(writer) => {
                            writer.gate.request(value);
                            true
                        }
                        None => false,
                    }
                };
                if !gated {
                    warn!("no write queue for {id}; request kept in model only");
                }
            }
        }
        Ok(())
    }

    /// Apply a preset: one smooth target per display kind. The engine
    /// consumes only the two floats; preset records live elsewhere.
    pub async fn apply_preset(&self, internal_value: f32, external_value: f32) {
        let targets: Vec<(DisplayId, f32)> = {
            let registry = self.shared.registry.read().await;
            registry
                .links()
                .into_iter()
                .map(|(id, kind, _)| {
                    let value = match kind {
                        DisplayKind::Internal => internal_value,
                        DisplayKind::External => external_value,
                    };
                    (id, value)
                })
                .collect()
        };
        for (id, value) in targets {
            if let Err(err) = self.request_brightness(&id, value, true).await {
                warn!("preset apply for {id} failed: {err}");
            }
        }
    }

    /// Read the internal panel fresh from hardware and smoothly bring
    /// every external display to the same value.
    pub async fn mirror_internal_to_external(&self) -> Result<(), EngineError> {
        let (internal, externals) = {
            let registry = self.shared.registry.read().await;
            let internal = registry
                .links()
                .into_iter()
                .find(|(_, kind, _)| *kind == DisplayKind::Internal);
            (internal, registry.ids_of_kind(DisplayKind::External))
        };

        let Some((internal_id, _, link)) = internal else {
            warn!("no internal display to mirror from");
            return Ok(());
        };

        let value = match link.lock().await.read() {
            Ok(value) => value,
            Err(err) => {
                debug!("fresh internal read failed ({err}), using last issued value");
                self.shared
                    .issued
                    .lock()
                    .unwrap()
                    .get(&internal_id)
                    .copied()
                    .unwrap_or(UNKNOWN_BRIGHTNESS)
            }
        };

        info!("mirroring internal brightness {value:.3} to {} external display(s)", externals.len());
        for id in externals {
            if let Err(err) = self.request_brightness(&id, value, true).await {
                warn!("mirror to {id} failed: {err}");
            }
        }
        Ok(())
    }

    /// Start watching platform hot-plug events; each settled burst
    /// triggers a discovery pass. The returned subscription owns the
    /// watcher and tears it down deterministically.
    pub fn watch_hotplug(&self) -> std::io::Result<HotplugSubscription> {
        let (subscription, mut events) = HotplugSubscription::start()?;
        let shared = self.shared.clone();
        tokio::spawn(async move {
            while events.recv().await.is_some() {
                // Coalesce the burst, then let hardware settle before
                // touching it.
                while events.try_recv().is_ok() {}
                tokio::time::sleep(HOTPLUG_SETTLE).await;
                info!("hot-plug settled, rediscovering displays");
                if let Err(err) = refresh_shared(&shared).await {
                    warn!("hot-plug refresh failed: {err}");
                }
            }
        });
        Ok(subscription)
    }

    fn start_ramp(&self, id: &str, kind: DisplayKind, link: SharedLink, target: f32) {
        let config = &self.shared.config;
        let start = self
            .shared
            .issued
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(UNKNOWN_BRIGHTNESS);

        if (start - target).abs() < config.ramp_epsilon {
            debug!("ramp for {id} skipped, already at {target:.3}");
            return;
        }

        cancel_ramp(&self.shared, id);

        let queue = match kind {
            DisplayKind::External => {
                let queue = {
                    let writers = self.shared.writers.lock().unwrap();
                    writers.get(id).map(|writer| writer.queue.clone())
                };
                match queue {
                    Some(queue) => Some(queue),
                    None => {
                        // External writes only ever go through a queue;
                        // never ramp an external link inline.
                        warn!("no write queue for {id}; request kept in model only");
                        return;
                    }
                }
            }
            DisplayKind::Internal => None,
        };

        let spec = RampSpec {
            id: id.to_string(),
            kind,
            start,
            target,
            duration: config.ramp_duration(),
            tick_hz: match kind {
                DisplayKind::Internal => config.internal_tick_hz,
                DisplayKind::External => config.external_tick_hz,
            },
        };
        let session = ramp::spawn(spec, link, queue, self.shared.issued.clone());
        self.shared
            .ramps
            .lock()
            .unwrap()
            .insert(id.to_string(), session);
    }
}

fn cancel_ramp(shared: &Shared, id: &str) {
    if let Some(session) = shared.ramps.lock().unwrap().remove(id) {
        session.cancel();
    }
}

/// Discovery pass over the shared state. Also the entry point for the
/// hot-plug task, which has no `Engine` handle.
pub(crate) async fn refresh_shared(shared: &Arc<Shared>) -> Result<(), EngineError> {
    let worker = shared.clone();
    let discovered = match tokio::task::spawn_blocking(move || worker.enumerator.enumerate()).await
    {
        Ok(discovered) => discovered,
        Err(err) => {
            error!("enumeration task failed: {err}");
            Vec::new()
        }
    };

    if discovered.is_empty() {
        // Non-fatal: keep serving the last known registry.
        warn!("discovery found no active displays; retaining last known registry");
        return Err(EngineError::DiscoveryFailed);
    }

    let mut entries = HashMap::new();
    let mut displays = Vec::new();
    let mut writers = HashMap::new();

    for found in discovered {
        let kind = found.link.kind();
        let name = found
            .name
            .unwrap_or_else(|| format!("Display {}", found.id));
        if !found.link.has_channel() {
            // Reported once here, not per request.
            warn!(
                "display {} has no working control channel; brightness control disabled",
                found.id
            );
        }
        let link: SharedLink = Arc::new(Mutex::new(found.link));

        // Internal prefers a fresh hardware read; external seeds from the
        // persisted cache because control-channel reads right after
        // discovery are slow and often refused.
        let brightness = match kind {
            DisplayKind::Internal => link.lock().await.read().unwrap_or(UNKNOWN_BRIGHTNESS),
            DisplayKind::External => shared.cache.get(&found.id).unwrap_or(UNKNOWN_BRIGHTNESS),
        };

        if kind == DisplayKind::External {
            let queue = WriteQueue::spawn(found.id.clone(), link.clone(), shared.config.write_gap());
            let gate = DebounceGate::spawn(queue.clone(), shared.config.debounce_window());
            writers.insert(found.id.clone(), Writer { queue, gate });
        }

        shared
            .issued
            .lock()
            .unwrap()
            .insert(found.id.clone(), brightness);
        entries.insert(
            found.id.clone(),
            RegistryEntry {
                name: name.clone(),
                kind,
                link,
            },
        );
        displays.push(Display {
            id: found.id,
            name,
            kind,
            brightness,
        });
    }

    // Sessions aimed at the outgoing registry are stale; stop them before
    // the swap. In-flight writes complete naturally.
    for (_, session) in shared.ramps.lock().unwrap().drain() {
        session.cancel();
    }

    {
        // Both maps swap under the registry write lock: a request that
        // sees a fresh registry entry must also find its write queue.
        let mut registry = shared.registry.write().await;
        *shared.writers.lock().unwrap() = writers;
        *registry = Registry::new(entries);
    }
    shared.model.write().await.replace_all(displays);

    // Immediate sync, then a second pass once slow controllers have
    // settled.
    sync::sync_all(shared).await;
    let delayed = shared.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delayed.config.delayed_sync()).await;
        debug!("running delayed post-discovery sync");
        sync::sync_all(&delayed).await;
    });

    Ok(())
}
