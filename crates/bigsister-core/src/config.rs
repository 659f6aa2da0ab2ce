//! Configuration management for BigSister.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::features::{FeatureDefinition, FeatureSettings};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/bigsister/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Feature manager behavior
    pub manager: ManagerConfig,
    /// Global feature defaults
    pub defaults: FeatureSettings,
    /// Feature definitions, loaded in this order
    pub features: Vec<FeatureDefinition>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            manager: ManagerConfig::default(),
            defaults: FeatureSettings::default(),
            features: builtin_definitions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    ///
    /// # Errors
    /// Returns error if the file is missing, unreadable, or not valid TOML.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `BIGSISTER_DEBUG`: Override debug mode (true/false)
    /// - `BIGSISTER_SELF_TEST`: Override self-test policy (blocking/advisory)
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BIGSISTER_DEBUG") {
            if let Ok(flag) = val.parse::<bool>() {
                self.general.debug = flag;
                tracing::debug!("Override general.debug from env: {}", flag);
            }
        }

        if let Ok(val) = std::env::var("BIGSISTER_SELF_TEST") {
            match val.as_str() {
                "blocking" => self.manager.self_test = SelfTestPolicy::Blocking,
                "advisory" => self.manager.self_test = SelfTestPolicy::Advisory,
                other => tracing::warn!("Ignoring unknown BIGSISTER_SELF_TEST value: {}", other),
            }
        }

        self
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/bigsister/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "maassec", "bigsister").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Debug mode, visible to every feature action
    pub debug: bool,
}

/// Feature manager settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// How a failing self-test affects loading
    pub self_test: SelfTestPolicy,
}

/// Effect of a feature's self-test returning false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfTestPolicy {
    /// The feature is dropped
    #[default]
    Blocking,
    /// A warning is logged and the feature still loads
    Advisory,
}

fn builtin_definition(
    id: &str,
    display_name: &str,
    description: &str,
    icon: &str,
) -> FeatureDefinition {
    FeatureDefinition::new(id)
        .with("enabled", true)
        .with("display_name", display_name)
        .with("version", "v1_0")
        .with("description", description)
        .with("icon", icon)
}

/// The features shipped with BigSister, in menu order.
fn builtin_definitions() -> Vec<FeatureDefinition> {
    vec![
        builtin_definition(
            "exiftool_scraper",
            "ExifTool Scraper",
            "Extract EXIF and related metadata via exiftool.",
            "🧾",
        ),
        builtin_definition(
            "zsteg",
            "Zsteg",
            "Detect/extract LSB-style stego in PNG/BMP via zsteg.",
            "🧬",
        ),
        builtin_definition(
            "steghide",
            "Steghide",
            "Inspect/extract stego payloads in JPG/BMP/WAV/AU via steghide.",
            "🔐",
        ),
        builtin_definition(
            "binwalk",
            "Binwalk",
            "Scan/extract embedded firmware/files; entropy analysis.",
            "📦",
        ),
        builtin_definition(
            "iris",
            "IRIS (Reverse Image Search)",
            "Reverse image search across public engines.",
            "🔎",
        ),
    ]
}
