// SPDX-License-Identifier: GPL-3.0-only
//! Device registry
//!
//! Maps each active display identifier to its driver kind, name, and
//! resolved hardware link. Rebuilt wholesale by every discovery pass:
//! atomic-replace, never incremental-patch, so stale and fresh identifiers
//! can never mix. In-flight writes holding a stale link complete or fail
//! naturally.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::model::{DisplayId, DisplayKind};
use crate::protocols::LinkDriver;

/// A link shared between the serializer task, ramp sessions, and the sync
/// engine. The per-display mutex is the only exclusion scope: writes to
/// different displays proceed concurrently.
pub type SharedLink = Arc<Mutex<LinkDriver>>;

pub struct RegistryEntry {
    pub name: String,
    pub kind: DisplayKind,
    pub link: SharedLink,
}

#[derive(Default)]
pub struct Registry {
    entries: HashMap<DisplayId, RegistryEntry>,
}

impl Registry {
    pub fn new(entries: HashMap<DisplayId, RegistryEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// Snapshot of `(id, kind, link)` triples for off-thread hardware
    /// passes.
    pub fn links(&self) -> Vec<(DisplayId, DisplayKind, SharedLink)> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.kind, entry.link.clone()))
            .collect()
    }

    pub fn ids_of_kind(&self, kind: DisplayKind) -> Vec<DisplayId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
