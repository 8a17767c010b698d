// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Configuration file (`editbridge.toml`) types.
//!
//! Every field has a default, so an empty file (or no file) is a valid configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::editor::autosave::{DEFAULT_DEBOUNCE_MS, DEFAULT_STATUS_HIDE_MS};
use crate::editor::history::DEFAULT_HISTORY_CAP;
use crate::editor::DEFAULT_SELECTORS;
use crate::model::{Selector, SelectorError};
use crate::store::WriteDurability;

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_status_hide_ms() -> u64 {
    DEFAULT_STATUS_HIDE_MS
}

fn default_selectors() -> Vec<String> {
    DEFAULT_SELECTORS.iter().map(|s| (*s).to_owned()).collect()
}

fn default_bind() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    27436
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("page-edits")
}

/// Toolbar box size and spacing, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbarGeometry {
    pub width: f64,
    pub height: f64,
    /// Distance between toolbar and element.
    pub gap: f64,
    /// Minimum distance to the viewport edges.
    pub margin: f64,
}

impl Default for ToolbarGeometry {
    fn default() -> Self {
        Self {
            width: 420.0,
            height: 40.0,
            gap: 10.0,
            margin: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    #[serde(default = "default_status_hide_ms")]
    pub status_hide_ms: u64,
    #[serde(default)]
    pub toolbar: ToolbarGeometry,
    /// Candidate selectors for discovery.
    #[serde(default = "default_selectors")]
    pub selectors: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            history_cap: default_history_cap(),
            status_hide_ms: default_status_hide_ms(),
            toolbar: ToolbarGeometry::default(),
            selectors: default_selectors(),
        }
    }
}

impl EditorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn status_hide_delay(&self) -> Duration {
        Duration::from_millis(self.status_hide_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid("editor.debounce_ms must be positive".into()));
        }
        if self.history_cap < 2 {
            return Err(ConfigError::Invalid("editor.history_cap must be at least 2".into()));
        }
        if self.selectors.is_empty() {
            return Err(ConfigError::Invalid("editor.selectors must not be empty".into()));
        }
        for selector in &self.selectors {
            Selector::parse(selector)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,
    /// Bearer token required by the endpoints. Without one every request is authenticated.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub durable_writes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            pages_dir: default_pages_dir(),
            token: None,
            durable_writes: false,
        }
    }
}

impl ServerConfig {
    pub fn durability(&self) -> WriteDurability {
        if self.durable_writes {
            WriteDurability::Durable
        } else {
            WriteDurability::BestEffort
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid selector in config: {0}")]
    Selector(#[from] SelectorError),
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.editor.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.editor.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
