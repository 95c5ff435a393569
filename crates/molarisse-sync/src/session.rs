// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`SessionStore`] implementations.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::DashMap;
use molarisse_core::SessionStore;
use tracing::{debug, warn};

/// Process-lifetime store. Fresh per instance, which keeps tests isolated.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: DashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// JSON object on disk, so names survive restarts of the CLI.
///
/// The whole file is rewritten on every `set`; the key count is one per
/// partner, so this stays small.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
    values: DashMap<String, String>,
    write_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    /// Open `path`, loading existing entries. A missing or corrupt file
    /// starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = DashMap::new();
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                &content,
            ) {
                Ok(map) => {
                    for (key, value) in map {
                        if let Some(s) = value.as_str() {
                            values.insert(key, s.to_string());
                        }
                    }
                    debug!(path = %path.display(), entries = values.len(), "session store loaded");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "session store is corrupt, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read session store");
            }
        }
        Self {
            path,
            values,
            write_lock: Mutex::new(()),
        }
    }

    fn flush(&self) {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|e| (e.key().clone(), serde_json::Value::String(e.value().clone())))
            .collect();
        let result = serde_json::to_string_pretty(&map)
            .map_err(std::io::Error::other)
            .and_then(|json| {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, json)
            });
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to persist session store");
        }
    }
}

impl SessionStore for JsonFileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.flush();
    }
}
