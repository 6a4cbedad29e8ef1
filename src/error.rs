// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the engine
//!
//! Hardware-layer errors are absorbed at the driver/serializer boundary and
//! surfaced as typed outcomes. Nothing in here is fatal: a display the
//! engine cannot physically control degrades to software-model-only
//! behavior.

use thiserror::Error;

use crate::model::DisplayId;

/// Failure reading brightness from hardware.
#[derive(Error, Debug)]
pub enum ReadError {
    /// No brightness interface responded for this display. Callers must
    /// treat the display as brightness-unknown (policy default: 0.5).
    #[error("no brightness interface available")]
    Unavailable,

    /// External display without a resolved control-channel handle.
    #[error("no control-channel handle resolved for this display")]
    NoHandle,

    /// The device reported a maximum luminance of zero; the reading is
    /// ambiguous and must not be used.
    #[error("device reported max luminance of zero")]
    InvalidMax,

    /// Control-channel communication failed.
    #[error("control channel read failed: {source}")]
    Protocol {
        #[source]
        source: anyhow::Error,
    },
}

/// Failure writing brightness to hardware.
#[derive(Error, Debug)]
pub enum WriteError {
    /// External display without a resolved control-channel handle; the
    /// write is dropped.
    #[error("no control-channel handle resolved for this display")]
    NoHandle,

    /// The hardware rejected or did not acknowledge the write. Not retried
    /// automatically; the model keeps the requested value until the next
    /// sync.
    #[error("hardware rejected the write: {source}")]
    Rejected {
        #[source]
        source: anyhow::Error,
    },
}

/// Engine-level errors surfaced to callers.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A request referenced a display that is not in the registry.
    #[error("display {0} not found")]
    DisplayNotFound(DisplayId),

    /// Discovery enumerated no active displays. The last known registry is
    /// retained.
    #[error("discovery produced no active displays")]
    DiscoveryFailed,
}
