// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application configuration.
//!
//! Settings are read from `sketchboard.yaml`, first in the working
//! directory and then in the platform config directory. Every field is
//! optional in the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "sketchboard.yaml";

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "SKETCHBOARD_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding persisted canvas and marker state.
    pub data_dir: PathBuf,
    /// Image shown behind the marker tool. A drawn placeholder is used
    /// when unset or unreadable.
    pub reference_image: Option<PathBuf>,
    /// Initial window size in logical points.
    pub window_size: [f32; 2],
    /// Raise the default log level to `debug`.
    pub debug_logging: bool,
    /// Use the local camera and microphone when present. When off, capture
    /// always offers to pick a file instead.
    pub capture_devices: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reference_image: None,
            window_size: [1280.0, 800.0],
            debug_logging: false,
            capture_devices: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .map(|dir| dir.join("sketchboard"))
        .unwrap_or_else(|| PathBuf::from(".sketchboard"))
}

impl AppConfig {
    /// Load the configuration from the first config file found, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let candidates = [
            Some(PathBuf::from(CONFIG_FILE)),
            dirs_next::config_dir().map(|dir| dir.join("sketchboard").join(CONFIG_FILE)),
        ];

        let mut config = match candidates.iter().flatten().find(|p| p.exists()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        Ok(config)
    }

    /// Parse a configuration file. An empty file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("Malformed config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "reference_image: kidney.png\ndebug_logging: true\ncapture_devices: false\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.reference_image, Some(PathBuf::from("kidney.png")));
        assert!(config.debug_logging);
        assert!(!config.capture_devices);
        assert_eq!(config.window_size, AppConfig::default().window_size);
    }

    #[test]
    fn test_empty_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "").unwrap();

        assert_eq!(AppConfig::from_file(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "window_size: [wide").unwrap();

        assert!(AppConfig::from_file(&path).is_err());
    }
}
