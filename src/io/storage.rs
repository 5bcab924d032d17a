// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Key/value persistence for application state.
//!
//! Each key maps to one JSON document. `FileStorage` keeps one file per key
//! in the data directory; `MemoryStorage` keeps everything in memory and
//! counts writes.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Storage key of the diagram document.
pub const CANVAS_STATE_KEY: &str = "canvas_state";

/// Storage key of the marker list.
pub const MARKERS_KEY: &str = "markers";

pub trait Storage {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Stores each key as `<dir>/<key>.json`.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // Write beside the target, then rename over it
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut storage = Self::default();
        storage.values.insert(key.to_string(), value.to_string());
        storage
    }

    /// Number of `set` calls so far.
    #[cfg(test)]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.writes += 1;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
