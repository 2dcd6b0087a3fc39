//! Configuration file loading
//!
//! Loads user configuration from `~/.config/deskrec/config.toml`. Every
//! field is optional; command-line flags override what the file says.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DeskrecError, Result};
use crate::types::{CaptureRegion, FrameRate};

/// Which capture backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Generated test pattern, no device needed
    Synthetic,
    /// libavdevice screen grab
    Ffmpeg,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "ffmpeg") {
            Self::Ffmpeg
        } else {
            Self::Synthetic
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synthetic => write!(f, "synthetic"),
            Self::Ffmpeg => write!(f, "ffmpeg"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "synthetic" | "test" | "pattern" => Ok(Self::Synthetic),
            "ffmpeg" | "libav" => Ok(Self::Ffmpeg),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// What to capture
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Where to capture from
    #[serde(default)]
    pub device: DeviceSettings,
}

/// Region and rate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Region to capture; the CLI requires one from here or its flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<CaptureRegion>,

    /// Frames per second
    #[serde(default = "default_fps")]
    pub fps: FrameRate,
}

/// Capture device settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Backend to use
    #[serde(default)]
    pub backend: BackendKind,

    /// libavdevice input format (ffmpeg backend only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Device URL (ffmpeg backend only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_fps() -> FrameRate {
    FrameRate::DEFAULT
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            region: None,
            fps: default_fps(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("deskrec").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("deskrec")
                .join("config.toml")
        } else {
            PathBuf::from("deskrec.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DeskrecError::config(format!("Failed to read config file: {}", e)))?;

        let config = Self::parse(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DeskrecError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DeskrecError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DeskrecError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DeskrecError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# deskrec configuration

[capture]
# Screen region in pixels; right must exceed left and bottom must exceed top
region = { left = 0, top = 0, right = 1920, bottom = 1080 }

# Frames per second requested from the capture device
fps = 30

[device]
# Backend: "ffmpeg" (needs a build with the ffmpeg feature) or "synthetic"
backend = "synthetic"

# libavdevice input format and URL for the ffmpeg backend.
# Platform defaults: dshow "video=screen-capture-recorder" (Windows),
# x11grab "$DISPLAY" (Linux), avfoundation "1:none" (macOS)
# format = "x11grab"
# url = ":0.0"
"#
    .to_string()
}
