//! Runtime configuration.
//!
//! Read once at start-up from an optional TOML file, then patched from the
//! environment. Every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::touch::PollSettings;

/// Default tile edge, in scene units.
pub const DEFAULT_TILE_SIZE: u32 = 1024;

/// Tile sizes at or below this are ignored.
pub const MIN_TILE_SIZE: u32 = 128;

pub const ENV_FLATTEN: &str = "INKBOARD_STROKE_FLATTEN";
pub const ENV_TILE_SIZE: &str = "INKBOARD_STROKE_TILE_SIZE";
pub const ENV_ANTI_ALIAS: &str = "INKBOARD_STROKE_AA";
pub const ENV_TOUCH: &str = "INKBOARD_TOUCH";
pub const ENV_TOUCH_DIR: &str = "INKBOARD_TOUCH_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub flatten: FlattenConfig,
    pub touch: TouchConfig,
}

/// Stroke flattening settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    pub enabled: bool,
    pub tile_size: u32,
    pub anti_alias: bool,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tile_size: DEFAULT_TILE_SIZE,
            anti_alias: true,
        }
    }
}

impl FlattenConfig {
    /// Configured tile size, or the default when it does not clear the floor.
    pub fn effective_tile_size(&self) -> u32 {
        if self.tile_size > MIN_TILE_SIZE {
            self.tile_size
        } else {
            warn!(
                tile_size = self.tile_size,
                min = MIN_TILE_SIZE,
                "tile size too small, using default"
            );
            DEFAULT_TILE_SIZE
        }
    }
}

/// Touch tracker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    pub enabled: bool,
    /// Directory holding `eventN` nodes.
    pub device_dir: PathBuf,
    /// Only `event0` .. `event{max_nodes - 1}` are probed.
    pub max_nodes: usize,
    pub backoff_ms: u64,
    /// Longest wait for input before the poller re-checks for shutdown.
    pub wake_ms: u64,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_dir: PathBuf::from("/dev/input"),
            max_nodes: 32,
            backoff_ms: 10,
            wake_ms: 50,
        }
    }
}

impl TouchConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            backoff: Duration::from_millis(self.backoff_ms),
            wake_interval: Duration::from_millis(self.wake_ms.max(1)),
        }
    }
}

/// `0` and `false` (any case) switch a feature off; anything else leaves it.
fn is_false(value: &str) -> bool {
    let value = value.trim();
    value == "0" || value.eq_ignore_ascii_case("false")
}

impl Config {
    /// Load from `path` (if any) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(ENV_FLATTEN).is_some_and(|v| is_false(&v)) {
            self.flatten.enabled = false;
        }
        if lookup(ENV_ANTI_ALIAS).is_some_and(|v| is_false(&v)) {
            self.flatten.anti_alias = false;
        }
        if let Some(raw) = lookup(ENV_TILE_SIZE) {
            match raw.trim().parse::<u32>() {
                Ok(size) if size > MIN_TILE_SIZE => self.flatten.tile_size = size,
                _ => warn!(value = %raw, "ignoring {ENV_TILE_SIZE}"),
            }
        }
        if lookup(ENV_TOUCH).is_some_and(|v| is_false(&v)) {
            self.touch.enabled = false;
        }
        if let Some(dir) = lookup(ENV_TOUCH_DIR) {
            self.touch.device_dir = PathBuf::from(dir);
        }
    }
}
