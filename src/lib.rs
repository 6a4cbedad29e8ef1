// SPDX-License-Identifier: GPL-3.0-only
//! Display brightness control engine
//!
//! Controls brightness across heterogeneous outputs: an internal panel
//! reachable through OS backlight services and external monitors reachable
//! through DDC/CI. The engine abstracts both access paths behind one
//! interface, serializes and rate-limits writes to fragile external
//! controllers, produces smooth ramped transitions, and keeps its in-memory
//! model reconciled with ground-truth hardware state across wake and
//! hot-plug events.
//!
//! The presentation layer talks to [`Engine`] only: it reads model
//! snapshots, subscribes to change notifications, and issues
//! [`Engine::request_brightness`] calls. Raw hardware errors never cross
//! that boundary.

#[macro_use]
extern crate tracing;

pub mod cache;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod hotplug;
pub mod model;
pub mod protocols;
pub mod registry;

mod gate;
mod ramp;
mod serializer;
mod sync;

pub use cache::CacheStore;
pub use config::EngineConfig;
pub use discovery::{DiscoveredDisplay, DisplayEnumerator, PlatformEnumerator};
pub use engine::Engine;
pub use error::{EngineError, ReadError, WriteError};
pub use hotplug::HotplugSubscription;
pub use model::{Display, DisplayId, DisplayKind};
