// Configuration management for chapterplay
// Handles loading/saving settings, with sensible defaults when config is missing

use crate::audio::DEFAULT_END_OF_TRACK_MARGIN;
use crate::playback::PlaybackSpeed;
use crate::player::RuntimeSettings;
use crate::service::ServiceSettings;
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub playback: PlaybackConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Where `<audio_ref>.<audio_extension>` files are looked up.
    pub audio_dir: PathBuf,
    pub audio_extension: String,
    /// Book manifest used when `--book` is not given.
    pub book_manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub end_of_track_margin_secs: f64,
    pub seek_coalesce_ms: u64,
    pub default_speed: PlaybackSpeed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub filter: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            audio_dir: dirs::audio_dir().unwrap_or_else(|| PathBuf::from("audio")),
            audio_extension: "mp3".to_string(),
            book_manifest: None,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            end_of_track_margin_secs: DEFAULT_END_OF_TRACK_MARGIN,
            seek_coalesce_ms: 0,
            default_speed: PlaybackSpeed::Normal,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            filter: "info,chapterplay=debug".to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults there on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing config {}", path.display()))?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("chapterplay");

        Ok(config_dir.join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let margin = self.playback.end_of_track_margin_secs;
        if !margin.is_finite() || margin < 0.0 {
            anyhow::bail!(
                "playback.end_of_track_margin_secs must be a non-negative number, got {}",
                margin
            );
        }
        Ok(())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            end_of_track_margin: self.playback.end_of_track_margin_secs,
            ..ServiceSettings::default()
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            seek_coalesce: Duration::from_millis(self.playback.seek_coalesce_ms),
        }
    }
}
