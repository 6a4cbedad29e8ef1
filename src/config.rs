// SPDX-License-Identifier: GPL-3.0-only
//! Engine configuration
//!
//! All timing and calibration tunables live here with their hardware-safe
//! defaults. Values can be overridden from a TOML file in the user config
//! directory; a missing or malformed file falls back to defaults rather
//! than failing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum delay after each external write before the next may issue
    /// ("Moderate Mode" cadence). Part of the hardware compatibility
    /// contract.
    pub write_gap_ms: u64,

    /// Window over which bursts of instant external requests are coalesced
    /// into the last value.
    pub debounce_window_ms: u64,

    /// Duration of a smooth brightness ramp.
    pub ramp_duration_ms: u64,

    /// Ramp tick rate for the internal panel. High, to track high-refresh
    /// displays.
    pub internal_tick_hz: f32,

    /// Ramp tick rate for external displays. Kept low because write
    /// latency on the control channel makes higher rates pointless and
    /// harmful.
    pub external_tick_hz: f32,

    /// Near-equal threshold below which a smooth request is skipped.
    pub ramp_epsilon: f32,

    /// Model/hardware delta below which sync leaves the model alone.
    pub sync_jitter: f32,

    /// Delay before the second post-discovery sync pass. Some external
    /// controllers reject control-channel traffic for 1-2s after
    /// wake/hot-plug even though discovery already succeeded.
    pub delayed_sync_ms: u64,

    /// Whether editing a draft preset value previews live on hardware.
    /// The engine only carries this policy flag; enforcement belongs to
    /// the presentation layer.
    pub preview_while_editing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            write_gap_ms: 20,
            debounce_window_ms: 200,
            ramp_duration_ms: 350,
            internal_tick_hz: 120.0,
            external_tick_hz: 30.0,
            ramp_epsilon: 0.01,
            sync_jitter: 0.01,
            delayed_sync_ms: 2000,
            preview_while_editing: false,
        }
    }
}

impl EngineConfig {
    /// Load from the default location (`<config dir>/brightness-engine/
    /// engine.toml`), falling back to defaults when absent or malformed.
    pub fn load_default() -> Self {
        match default_path() {
            Some(path) => Self::load(&path),
            None => Self::default(),
        }
    }

    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("malformed engine config at {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn write_gap(&self) -> Duration {
        Duration::from_millis(self.write_gap_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn ramp_duration(&self) -> Duration {
        Duration::from_millis(self.ramp_duration_ms)
    }

    pub fn delayed_sync(&self) -> Duration {
        Duration::from_millis(self.delayed_sync_ms)
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("brightness-engine").join("engine.toml"))
}
