//! Configuration loading.
//!
//! An optional TOML file supplies defaults; command-line flags win over it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use audio_player::config::PlaybackConfig;
use serde::Deserialize;

/// Store location used when neither the CLI nor the config file names one.
pub const DEFAULT_STORE: &str = "playlists.json";

/// Top-level player configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output device substring.
    pub device: Option<String>,
    /// Playlist store file.
    pub store: Option<PathBuf>,
    /// Start with shuffle enabled.
    pub shuffle: bool,
    /// Engine tuning.
    pub playback: PlaybackConfig,
}

impl PlayerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<PlayerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Load from `path` when given, else use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Store path: CLI flag, then config file, then [`DEFAULT_STORE`].
    pub fn store_path(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.store.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE))
    }

    /// Device needle: CLI flag, then config file.
    pub fn device(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.device.clone())
    }
}
