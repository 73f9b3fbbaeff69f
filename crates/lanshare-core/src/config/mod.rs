//! Configuration management for LanShare.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/lanshare/config.toml` |
//! | macOS | `~/Library/Application Support/com.lanshare.LanShare/config.toml` |
//! | Windows | `%APPDATA%\lanshare\LanShare\config\config.toml` |
//!
//! Every field has a default, so a partial file (or no file at all) is valid.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanshare_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Port: {}", config.network.port);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// User configuration, one table per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Network settings
    pub network: NetworkConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
    /// UI settings
    pub ui: UiConfig,
}

/// General configuration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Where received content is written (current directory when unset)
    pub output_dir: Option<PathBuf>,
}

/// Network configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP port hosts listen on
    pub port: u16,
    /// How long a lookup browses before giving up
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Duration,
    /// How long registration checks the network for an existing code
    #[serde(with = "humantime_serde")]
    pub registration_check_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            lookup_timeout: Duration::from_secs(crate::DEFAULT_LOOKUP_TIMEOUT_SECS),
            registration_check_timeout: Duration::from_secs(
                crate::DEFAULT_REGISTRATION_CHECK_SECS,
            ),
        }
    }
}

/// Transfer configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunk size for streamed bodies
    pub chunk_size: usize,
    /// Extract received archives
    pub decompress: bool,
    /// Number of concurrent uploads tracked by a receiving host
    pub progress_slots: usize,
    /// Upload size cap in bytes (None for unlimited)
    pub max_upload_size: Option<u64>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            decompress: true,
            progress_slots: crate::DEFAULT_PROGRESS_SLOTS,
            max_upload_size: None,
        }
    }
}

/// UI configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Print a QR code of the session URL when hosting
    pub show_qr: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { show_qr: true }
    }
}

impl Config {
    /// Read `config.toml` from the platform config directory, or defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unreadable or malformed file.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Write `config.toml` to the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Output directory for received content, defaulting to the current directory.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.general
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Platform config directory, if the OS reports a home directory.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "lanshare", "LanShare")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Path of `config.toml`; falls back to the current directory.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            return ms
                .parse()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom);
        }
        s.strip_suffix('s')
            .map(|secs| {
                secs.parse()
                    .map(Duration::from_secs)
                    .map_err(serde::de::Error::custom)
            })
            .or_else(|| {
                s.strip_suffix('m').map(|mins| {
                    mins.parse::<u64>()
                        .map_err(serde::de::Error::custom)
                        .and_then(|m| {
                            m.checked_mul(60)
                                .map(Duration::from_secs)
                                .ok_or_else(|| serde::de::Error::custom("duration out of range"))
                        })
                })
            })
            .unwrap_or_else(|| Err(serde::de::Error::custom("invalid duration format")))
    }
}
