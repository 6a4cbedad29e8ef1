// SPDX-License-Identifier: GPL-3.0-only
//! Persisted last-brightness cache
//!
//! Maps display identifiers to the last accepted brightness value. Written
//! on every accepted request and read back at discovery time as the initial
//! value for external displays (the internal panel always prefers a fresh
//! hardware read). Persistence failures are logged and never propagate to
//! the request path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::model::DisplayId;

#[derive(Debug, Default, Deserialize, Serialize)]
struct CacheFile {
    #[serde(default)]
    brightness: HashMap<DisplayId, f32>,
}

pub struct CacheStore {
    path: Option<PathBuf>,
    values: Mutex<HashMap<DisplayId, f32>>,
}

impl CacheStore {
    /// Open the cache at the default location (`<state dir>/
    /// brightness-engine/brightness.toml`).
    pub fn open_default() -> Self {
        let dir = dirs::state_dir().or_else(dirs::cache_dir);
        match dir {
            Some(dir) => Self::open(dir.join("brightness-engine").join("brightness.toml")),
            None => Self::in_memory(),
        }
    }

    pub fn open(path: PathBuf) -> Self {
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| toml::from_str::<CacheFile>(&raw).ok())
            .map(|file| file.brightness)
            .unwrap_or_default();

        Self {
            path: Some(path),
            values: Mutex::new(values),
        }
    }

    /// Cache without a backing file. Used when no state directory exists.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.values.lock().unwrap().get(id).copied()
    }

    pub fn set(&self, id: &str, value: f32) {
        let snapshot = {
            let mut values = self.values.lock().unwrap();
            values.insert(id.to_string(), value);
            values.clone()
        };
        if let Err(err) = self.persist(snapshot) {
            warn!("failed to persist brightness cache: {err}");
        }
    }

    fn persist(&self, brightness: HashMap<DisplayId, f32>) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string(&CacheFile { brightness })
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        std::fs::write(path, raw)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
