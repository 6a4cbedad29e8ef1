// SPDX-License-Identifier: GPL-3.0-only
//! Hardware link abstraction
//!
//! Two interchangeable drivers behind one interface: the internal panel
//! (OS backlight services) and external monitors (luminance register over
//! a control channel). The two paths have disjoint failure and performance
//! characteristics and never share a rate limiter or invocation policy.

pub mod backlight;
pub mod ddc_ci;

use crate::error::{ReadError, WriteError};
use crate::model::DisplayKind;

pub use backlight::InternalBacklight;
pub use ddc_ci::ExternalLink;

/// Raw external control channel: the luminance register on the device's
/// native 0-100 scale. Range mapping happens one layer up, in
/// [`ExternalLink`].
pub trait ControlChannel: Send {
    /// Read the luminance register, returning `(current, max)`.
    fn read_luminance(&mut self) -> anyhow::Result<(u16, u16)>;

    /// Write a raw luminance value.
    fn write_luminance(&mut self, value: u16) -> anyhow::Result<()>;
}

/// Internal panel backlight, already normalized to `[0.0, 1.0]`.
pub trait PanelBacklight: Send {
    fn read(&mut self) -> Result<f32, ReadError>;
    fn write(&mut self, value: f32) -> Result<(), WriteError>;
}

/// Resolved driver for one display.
pub enum LinkDriver {
    Internal(Box<dyn PanelBacklight>),
    /// `None` when hardware matching failed: reads report
    /// [`ReadError::NoHandle`] and writes are dropped with
    /// [`WriteError::NoHandle`], leaving the display software-model-only.
    External(Option<ExternalLink>),
}

impl LinkDriver {
    pub fn kind(&self) -> DisplayKind {
        match self {
            LinkDriver::Internal(_) => DisplayKind::Internal,
            LinkDriver::External(_) => DisplayKind::External,
        }
    }

    pub fn has_channel(&self) -> bool {
        !matches!(self, LinkDriver::External(None))
    }

    /// Read normalized brightness from hardware.
    pub fn read(&mut self) -> Result<f32, ReadError> {
        match self {
            LinkDriver::Internal(panel) => panel.read(),
            LinkDriver::External(Some(link)) => link.read(),
            LinkDriver::External(None) => Err(ReadError::NoHandle),
        }
    }

    /// Write normalized brightness to hardware.
    pub fn write(&mut self, value: f32) -> Result<(), WriteError> {
        match self {
            LinkDriver::Internal(panel) => panel.write(value),
            LinkDriver::External(Some(link)) => link.write(value),
            LinkDriver::External(None) => Err(WriteError::NoHandle),
        }
    }
}

impl std::fmt::Debug for LinkDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkDriver::Internal(_) => write!(f, "LinkDriver::Internal"),
            LinkDriver::External(Some(_)) => write!(f, "LinkDriver::External(matched)"),
            LinkDriver::External(None) => write!(f, "LinkDriver::External(unmatched)"),
        }
    }
}
