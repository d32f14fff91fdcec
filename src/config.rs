//! Daemon configuration loaded from TOML.

use crate::defaults;
use crate::error::{Result, SpeakError};
use crate::output::OutputMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub backend: BackendConfig,
    pub output: OutputConfig,
    /// Interactive CLI agent process names for window-context enrichment.
    pub agents: Vec<String>,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub max_seconds: u32,
}

/// LAN transcription backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// "whisper" (whisper.cpp server) or "openai".
    pub api_format: String,
    pub language: String,
}

/// Text output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub default_method: OutputMethod,
    /// App identifiers (substring match, lowercase) treated as terminals.
    pub terminal_apps: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            max_seconds: defaults::MAX_RECORD_SECONDS,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: defaults::BACKEND_URL.to_string(),
            api_format: defaults::BACKEND_API_FORMAT.to_string(),
            language: defaults::BACKEND_LANGUAGE.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_method: OutputMethod::Clipboard,
            terminal_apps: defaults::TERMINAL_APPS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file is unreadable or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        if config.agents.is_empty() {
            config.agents = default_agents();
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file does
    /// not exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default_with_agents())
        }
    }

    /// Defaults with the built-in agent list filled in.
    pub fn default_with_agents() -> Self {
        Self {
            agents: default_agents(),
            ..Self::default()
        }
    }

    /// Ring buffer capacity in bytes, derived from the audio settings.
    ///
    /// `max_seconds × sample_rate × 2` (16-bit mono). This is a computed
    /// quantity, not an independent setting.
    pub fn ring_buffer_bytes(&self) -> usize {
        self.audio.max_seconds as usize
            * self.audio.sample_rate as usize
            * defaults::SAMPLE_BYTES
    }

    /// The default configuration file path:
    /// `~/.config/speak-anywhere/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("speak-anywhere").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(SpeakError::ConfigParse {
                message: "audio.sample_rate must be positive".to_string(),
            });
        }
        if self.audio.max_seconds == 0 {
            return Err(SpeakError::ConfigParse {
                message: "audio.max_seconds must be positive".to_string(),
            });
        }
        if self.backend.api_format != "whisper" && self.backend.api_format != "openai" {
            return Err(SpeakError::ConfigParse {
                message: format!(
                    "backend.api_format must be \"whisper\" or \"openai\", got \"{}\"",
                    self.backend.api_format
                ),
            });
        }
        Ok(())
    }
}

fn default_agents() -> Vec<String> {
    defaults::KNOWN_AGENTS.iter().map(|s| s.to_string()).collect()
}
