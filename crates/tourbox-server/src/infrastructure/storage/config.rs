//! TOML-based configuration for the server binary.
//!
//! Reads and writes [`AppConfig`] at the platform-appropriate path:
//! - Windows:  `%APPDATA%\TourBoxServer\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/tourbox-server/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/TourBoxServer/config.toml`
//!
//! ```toml
//! [server]
//! port = 50500
//! bind_address = "127.0.0.1"
//! raw_events = false
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a serde default, so a partial file (or no file at all)
//! still yields a complete configuration.
//!
//! # What is TOML? (for beginners)
//!
//! TOML is a small text format for configuration files.  A `[server]` line
//! starts a table, and the `key = value` lines under it fill that table's
//! fields.  Here each table maps onto one Rust struct (`[server]` onto
//! [`ServerConfig`], `[logging]` onto [`LoggingConfig`]) and serde does the
//! conversion in both directions.  A key that is left out takes the value
//! of its `#[serde(default = ...)]` function.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::{DEFAULT_BIND_IP, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// TCP port the Console connects to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// IP address to bind.  Loopback by default; the Console usually runs
    /// on the same machine.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Whether to also report every received chunk verbatim.
    #[serde(default)]
    pub raw_events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"tourbox_core=trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    DEFAULT_BIND_IP.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            raw_events: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] when the base directory
/// cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, StorageError> {
    platform_config_dir().ok_or(StorageError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform path.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, StorageError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config at `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system errors other than "not
/// found", and [`StorageError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system failures or
/// [`StorageError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), StorageError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("TourBoxServer"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("tourbox-server"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("TourBoxServer")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
