//! Loader configuration persistence
//!
//! Stores defaults in `~/.config/csvview/config.yaml`. Every field has a
//! default, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::csv::Delimiter;
use crate::loader::{CachePolicy, MemoryBudget};

/// Which eviction discipline the row cache uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Fixed number of rows, arbitrary eviction
    #[default]
    Capacity,
    /// Contiguous window bounded by a memory budget
    Window,
}

/// Row cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub mode: CacheMode,
    /// Maximum cached rows in capacity mode
    pub capacity: usize,
    /// Memory budget in window mode
    pub budget: MemoryBudget,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::Capacity,
            capacity: 1024,
            budget: MemoryBudget::default(),
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        match self.mode {
            CacheMode::Capacity => CachePolicy::Capacity {
                max_entries: self.capacity,
            },
            CacheMode::Window => CachePolicy::Window(self.budget),
        }
    }
}

/// Offset index settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Build the whole index in the background from open
    pub eager: bool,
    /// Lines scanned per pass before the file lock is released
    pub pass_rows: usize,
    /// Pause between background passes, in milliseconds
    pub pass_delay_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            eager: true,
            pass_rows: 4096,
            pass_delay_ms: 0,
        }
    }
}

/// Prefetch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Rows read ahead after a requested row
    pub lookahead: usize,
    /// Pending requests kept before new ones are dropped
    pub queue_depth: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            lookahead: 8,
            queue_depth: 256,
        }
    }
}

/// Loader configuration that persists across sessions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub cache: CacheConfig,
    pub index: IndexConfig,
    pub prefetch: PrefetchConfig,
    /// Field delimiter; detected from the file when unset
    pub delimiter: Option<Delimiter>,
}

impl LoaderConfig {
    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = crate::config_paths::config_file() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load config from a specific file, or return defaults on any failure
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to disk
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> Result<(), String> {
        let path = crate::config_paths::config_file()
            .ok_or_else(|| "No config directory available".to_string())?;
        self.save_to(&path)
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write config to {}: {}", path.display(), e))?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp values into the ranges the loader supports
    pub fn validated(mut self) -> Self {
        let budget = &mut self.cache.budget;
        if !(budget.load_ratio > 0.0 && budget.load_ratio <= 0.5) {
            tracing::warn!(
                "load_ratio {} outside (0, 0.5], clamping",
                budget.load_ratio
            );
            budget.load_ratio = if budget.load_ratio > 0.5 { 0.5 } else { 0.3 };
        }
        if !(budget.clean_ratio > 0.0 && budget.clean_ratio <= 1.0) {
            tracing::warn!(
                "clean_ratio {} outside (0, 1], clamping",
                budget.clean_ratio
            );
            budget.clean_ratio = if budget.clean_ratio > 1.0 { 1.0 } else { 0.5 };
        }
        self.cache.capacity = self.cache.capacity.max(1);
        self.index.pass_rows = self.index.pass_rows.max(1);
        self.prefetch.queue_depth = self.prefetch.queue_depth.max(1);
        self
    }
}
