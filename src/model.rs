// SPDX-License-Identifier: GPL-3.0-only
//! Brightness model
//!
//! The authoritative in-process record of per-display brightness. The
//! presentation layer only ever reads this model; it is written by the
//! engine's request path and by the sync engine, never directly by
//! hardware code.

use tokio::sync::watch;

/// Opaque platform display identifier. Stable per active session, not
/// guaranteed stable across reboots or hot-plug.
pub type DisplayId = String;

/// Access-path classification, assigned once at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// Built-in panel, reached through OS backlight services. Fast and
    /// safe to call at high frequency.
    Internal,
    /// External monitor, reached through a control channel. Slow (tens of
    /// milliseconds per operation) and hardware-fragile.
    External,
}

/// Snapshot of one display as exposed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub id: DisplayId,
    pub name: String,
    pub kind: DisplayKind,
    /// Normalized brightness in `[0.0, 1.0]`. Holds the last requested or
    /// last synced value.
    pub brightness: f32,
}

/// Model storage plus push notification of changes.
///
/// Every mutation publishes a full snapshot on a watch channel, so
/// subscribers always observe the latest consistent state and never have
/// to poll.
pub struct BrightnessModel {
    displays: Vec<Display>,
    tx: watch::Sender<Vec<Display>>,
}

impl BrightnessModel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            displays: Vec::new(),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Display>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Display> {
        self.displays.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Display> {
        self.displays.iter().find(|d| d.id == id)
    }

    /// Replace the whole model after a discovery pass.
    pub fn replace_all(&mut self, displays: Vec<Display>) {
        self.displays = displays;
        self.publish();
    }

    /// Set one display's brightness. Returns false if the display is
    /// unknown.
    pub fn set_brightness(&mut self, id: &str, value: f32) -> bool {
        match self.displays.iter_mut().find(|d| d.id == id) {
            Some(display) => {
                display.brightness = value;
                self.publish();
                true
            }
            None => false,
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.displays.clone());
    }
}

impl Default for BrightnessModel {
    fn default() -> Self {
        Self::new()
    }
}
