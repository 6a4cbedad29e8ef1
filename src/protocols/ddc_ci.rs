// SPDX-License-Identifier: GPL-3.0-only
//! External control-channel driver (DDC/CI over I2C)
//!
//! DDC/CI is the register-based signaling path supported by most external
//! monitors via the video cable. Only the luminance register is touched.
//!
//! Writes map normalized `[0,1]` onto a restricted physical sub-range of
//! the device's 0-100 scale. Read-back normalizes against the max the
//! device itself reports, which is ground truth even when it disagrees
//! with the write-side calibration.

use anyhow::Result;
use ddc_hi::{Ddc, Display};

use super::ControlChannel;
use crate::error::{ReadError, WriteError};

/// VCP (Virtual Control Panel) code for luminance.
pub const LUMINANCE_CODE: u8 = 0x10;

/// Physical write sub-range. Values below 10 and above 60 sit in dead
/// zones on real hardware, so normalized brightness spans exactly this
/// band. Compatibility contract; do not change without recalibrating.
pub const PHYSICAL_MIN: f32 = 10.0;
pub const PHYSICAL_MAX: f32 = 60.0;

/// Map normalized brightness onto the physical write sub-range.
pub fn to_physical(value: f32) -> u16 {
    let v = value.clamp(0.0, 1.0);
    (PHYSICAL_MIN + v * (PHYSICAL_MAX - PHYSICAL_MIN)) as u16
}

/// Normalize a `(current, max)` luminance report. `None` when `max` is
/// zero, in which case the reading must be treated as failed.
pub fn normalize(current: u16, max: u16) -> Option<f32> {
    if max == 0 {
        return None;
    }
    Some(current as f32 / max as f32)
}

/// DDC/CI implementation of [`ControlChannel`].
pub struct DdcCiChannel {
    display: Display,
}

impl DdcCiChannel {
    pub fn new(display: Display) -> Self {
        Self { display }
    }

    /// Enumerate all reachable DDC/CI displays, with platform identifier
    /// and model name where the EDID provides one.
    pub fn enumerate() -> Vec<(String, Option<String>, Self)> {
        Display::enumerate()
            .into_iter()
            .map(|display| {
                let id = display.info.id.clone();
                let name = display.info.model_name.clone();
                (id, name, Self::new(display))
            })
            .collect()
    }
}

impl ControlChannel for DdcCiChannel {
    fn read_luminance(&mut self) -> Result<(u16, u16)> {
        let value = self.display.handle.get_vcp_feature(LUMINANCE_CODE)?;
        Ok((value.value(), value.maximum()))
    }

    fn write_luminance(&mut self, value: u16) -> Result<()> {
        self.display.handle.set_vcp_feature(LUMINANCE_CODE, value)?;
        Ok(())
    }
}

impl std::fmt::Debug for DdcCiChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DdcCiChannel(id: {})", self.display.info.id)
    }
}

/// Normalizing wrapper around a resolved control channel. This is the
/// external side of the hardware link abstraction: everything above it
/// speaks `[0.0, 1.0]`.
pub struct ExternalLink {
    channel: Box<dyn ControlChannel>,
}

impl ExternalLink {
    pub fn new(channel: Box<dyn ControlChannel>) -> Self {
        Self { channel }
    }

    pub fn read(&mut self) -> Result<f32, ReadError> {
        let (current, max) = self
            .channel
            .read_luminance()
            .map_err(|source| ReadError::Protocol { source })?;
        normalize(current, max).ok_or(ReadError::InvalidMax)
    }

    pub fn write(&mut self, value: f32) -> Result<(), WriteError> {
        self.channel
            .write_luminance(to_physical(value))
            .map_err(|source| WriteError::Rejected { source })
    }
}
