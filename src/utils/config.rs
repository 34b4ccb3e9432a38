//! Configuration management for cedarplayer
//!
//! This module handles loading and managing configuration from config files
//! and environment variables. The values here are the defaults a client
//! caches before a player exists.

use crate::player::{Enhancement, Screen, SubtitleParameters};
use crate::service::PlayerKind;
use crate::utils::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Subtitle defaults
    pub subtitle: SubtitleConfig,

    /// Display and image enhancement defaults
    pub display: DisplayConfig,

    /// Player selection overrides
    pub selection: SelectionConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Subtitle defaults applied to every new client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub gate: bool,
    /// ARGB
    pub color: u32,
    /// ARGB
    pub frame_color: u32,
    pub font_size: i32,
    /// Percentage of the screen height
    pub position: i32,
    /// Milliseconds
    pub delay: i32,
    pub charset: String,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Screen new clients render on
    pub screen: Screen,

    pub vpp_gate: bool,
    pub luma_sharp: i32,
    pub chroma_sharp: i32,
    pub white_extend: i32,
    pub black_extend: i32,

    /// Destination buffers used by the dual-display swapper
    pub swap_slots: usize,
}

/// Player selection configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// File extension (without the dot) to player kind, checked before the
    /// built-in table
    pub overrides: BTreeMap<String, PlayerKind>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        let params = SubtitleParameters::default();
        Self {
            gate: params.gate,
            color: params.color,
            frame_color: params.frame_color,
            font_size: params.font_size,
            position: params.position,
            delay: params.delay_ms,
            charset: params.charset,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let enhancement = Enhancement::default();
        Self {
            screen: Screen::Master,
            vpp_gate: enhancement.vpp_gate,
            luma_sharp: enhancement.luma_sharp,
            chroma_sharp: enhancement.chroma_sharp,
            white_extend: enhancement.white_extend,
            black_extend: enhancement.black_extend,
            swap_slots: crate::display::DEFAULT_SWAP_SLOTS,
        }
    }
}

impl From<&SubtitleConfig> for SubtitleParameters {
    fn from(config: &SubtitleConfig) -> Self {
        SubtitleParameters {
            gate: config.gate,
            color: config.color,
            frame_color: config.frame_color,
            font_size: config.font_size,
            position: config.position,
            delay_ms: config.delay,
            charset: config.charset.clone(),
        }
    }
}

impl From<&DisplayConfig> for Enhancement {
    fn from(config: &DisplayConfig) -> Self {
        Enhancement {
            vpp_gate: config.vpp_gate,
            luma_sharp: config.luma_sharp,
            chroma_sharp: config.chroma_sharp,
            white_extend: config.white_extend,
            black_extend: config.black_extend,
        }
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/cedarplayer/config.toml on Linux)
    /// 3. User config file (~/.config/cedarplayer/config.toml on Linux)
    /// 4. Environment variables (CEDARPLAYER_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config = Self::read_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config = Self::read_file(&user_path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| PlayerError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    /// Save configuration to the given path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlayerError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| PlayerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml)
            .map_err(|e| PlayerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Subtitle parameters a fresh client starts with
    pub fn subtitle_defaults(&self) -> SubtitleParameters {
        SubtitleParameters::from(&self.subtitle)
    }

    /// Enhancement settings a fresh client starts with
    pub fn enhancement_defaults(&self) -> Enhancement {
        Enhancement::from(&self.display)
    }

    /// Read a TOML file; sections and fields it omits keep their defaults
    fn read_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PlayerError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| PlayerError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(log_level) = std::env::var("CEDARPLAYER_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        if let Ok(screen) = std::env::var("CEDARPLAYER_SCREEN") {
            self.display.screen = screen
                .parse()
                .map_err(|_| PlayerError::Config("Invalid CEDARPLAYER_SCREEN".to_string()))?;
        }

        if let Ok(size) = std::env::var("CEDARPLAYER_SUB_FONT_SIZE") {
            self.subtitle.font_size = size
                .parse()
                .map_err(|_| PlayerError::Config("Invalid CEDARPLAYER_SUB_FONT_SIZE".to_string()))?;
        }

        if let Ok(charset) = std::env::var("CEDARPLAYER_SUB_CHARSET") {
            self.subtitle.charset = charset;
        }

        if let Ok(slots) = std::env::var("CEDARPLAYER_SWAP_SLOTS") {
            self.display.swap_slots = slots
                .parse()
                .map_err(|_| PlayerError::Config("Invalid CEDARPLAYER_SWAP_SLOTS".to_string()))?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(PlayerError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, valid_log_levels
            )));
        }

        if self.subtitle.font_size <= 0 {
            return Err(PlayerError::Config(
                "Subtitle font size must be positive".to_string(),
            ));
        }

        if self.subtitle.charset.is_empty() {
            return Err(PlayerError::Config(
                "Subtitle charset must not be empty".to_string(),
            ));
        }

        if self.display.swap_slots < crate::display::DEFAULT_SWAP_SLOTS {
            return Err(PlayerError::Config(format!(
                "Swap slot count must be at least {}",
                crate::display::DEFAULT_SWAP_SLOTS
            )));
        }

        if let Some(ext) = self
            .selection
            .overrides
            .keys()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(PlayerError::Config(format!(
                "Invalid selection override extension '{}'",
                ext
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/cedarplayer/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("cedarplayer").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from(
            "/Library/Application Support/cedarplayer/config.toml",
        ));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cedarplayer").join("config.toml"))
    }
}
