// SPDX-License-Identifier: GPL-3.0-only
//! Internal panel driver
//!
//! Write path is a ranked list of capability probes evaluated once at
//! discovery and resolved into a strategy: logind's `SetBrightness` call
//! (works unprivileged from an active session) first, direct sysfs writes
//! as the fallback. Reads always come from sysfs. If no backlight device
//! exists at all there is no internal display to control and probing
//! returns `None`.
//!
//! All calls here are fast compared to the external control channel and
//! are safe at high frequency, which is why the internal path bypasses the
//! write serializer entirely.

use std::path::{Path, PathBuf};

use zbus::proxy;

use super::PanelBacklight;
use crate::error::{ReadError, WriteError};

const SYSFS_BACKLIGHT: &str = "/sys/class/backlight";

/// Candidate device names tried in order before falling back to the first
/// entry present.
const CANDIDATE_DEVICES: &[&str] = &[
    "intel_backlight",
    "amdgpu_bl0",
    "amdgpu_bl1",
    "acpi_video0",
];

#[proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/session/auto"
)]
trait LogindSession {
    fn set_brightness(&self, subsystem: &str, name: &str, brightness: u32) -> zbus::Result<()>;
}

struct BacklightDevice {
    name: String,
    path: PathBuf,
    max: u32,
}

enum WriteStrategy {
    Logind(LogindSessionProxyBlocking<'static>),
    Sysfs,
}

pub struct InternalBacklight {
    device: BacklightDevice,
    strategy: WriteStrategy,
}

impl InternalBacklight {
    /// Probe for an internal panel. Blocking; call from a worker.
    pub fn probe() -> Option<Self> {
        let device = find_device(Path::new(SYSFS_BACKLIGHT))?;
        let strategy = match logind_session() {
            Some(proxy) => {
                debug!("backlight {}: using logind write path", device.name);
                WriteStrategy::Logind(proxy)
            }
            None => {
                debug!("backlight {}: logind unavailable, using sysfs writes", device.name);
                WriteStrategy::Sysfs
            }
        };
        Some(Self { device, strategy })
    }

    /// Sysfs-only driver rooted at an arbitrary directory.
    #[doc(hidden)]
    pub fn probe_sysfs_at(root: &Path) -> Option<Self> {
        let device = find_device(root)?;
        Some(Self {
            device,
            strategy: WriteStrategy::Sysfs,
        })
    }

    /// The sysfs device name, used as the session-stable display id.
    pub fn device_name(&self) -> &str {
        &self.device.name
    }
}

impl PanelBacklight for InternalBacklight {
    fn read(&mut self) -> Result<f32, ReadError> {
        let current =
            read_u32(&self.device.path.join("brightness")).ok_or(ReadError::Unavailable)?;
        if self.device.max == 0 {
            return Err(ReadError::Unavailable);
        }
        Ok((current as f32 / self.device.max as f32).clamp(0.0, 1.0))
    }

    fn write(&mut self, value: f32) -> Result<(), WriteError> {
        let raw = (value.clamp(0.0, 1.0) * self.device.max as f32).round() as u32;
        match &self.strategy {
            WriteStrategy::Logind(session) => session
                .set_brightness("backlight", &self.device.name, raw)
                .map_err(|err| WriteError::Rejected { source: err.into() }),
            WriteStrategy::Sysfs => {
                std::fs::write(self.device.path.join("brightness"), raw.to_string())
                    .map_err(|err| WriteError::Rejected { source: err.into() })
            }
        }
    }
}

fn logind_session() -> Option<LogindSessionProxyBlocking<'static>> {
    let connection = zbus::blocking::Connection::system().ok()?;
    LogindSessionProxyBlocking::new(&connection).ok()
}

/// Pick the backlight device: ordered candidates first, then whatever is
/// present.
fn find_device(root: &Path) -> Option<BacklightDevice> {
    for name in CANDIDATE_DEVICES {
        if let Some(device) = open_device(root.join(name)) {
            return Some(device);
        }
    }

    let entries = std::fs::read_dir(root).ok()?;
    for entry in entries.flatten() {
        if let Some(device) = open_device(entry.path()) {
            return Some(device);
        }
    }
    None
}

fn open_device(path: PathBuf) -> Option<BacklightDevice> {
    let max = read_u32(&path.join("max_brightness")).filter(|max| *max > 0)?;
    let name = path.file_name()?.to_string_lossy().into_owned();
    Some(BacklightDevice { name, path, max })
}

fn read_u32(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
}
