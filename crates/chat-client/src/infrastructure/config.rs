//! TOML-based configuration for the chat client.
//!
//! Reads `ClientConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\ChatOverTLS\config.toml`
//! - Linux:    `~/.config/chatovertls/config.toml`
//! - macOS:    `~/Library/Application Support/ChatOverTLS/config.toml`
//!
//! Every field carries a serde default so a partial (or absent) file works on
//! first run.  The expected server fingerprint can also come from the
//! `CHAT_SERVER_FINGERPRINT` environment variable, which takes precedence
//! over the file; the variable is read exactly once, inside
//! [`ClientConfig::load`] — nothing else in the process consults the
//! environment at runtime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the expected server certificate fingerprint
/// (lowercase-hex SHA-256 of the leaf certificate's DER encoding).
pub const FINGERPRINT_ENV: &str = "CHAT_SERVER_FINGERPRINT";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
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
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Server endpoint and pinning settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSettings {
    /// Server hostname or IP address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server TLS port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Expected lowercase-hex SHA-256 fingerprint of the server's leaf
    /// certificate.  Absent disables pinning (the client warns and accepts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4433
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            fingerprint: None,
        }
    }
}

impl ClientConfig {
    /// Loads the configuration for this process: file contents (defaults when
    /// the file is absent or unreadable) with the one-shot environment
    /// override applied.
    pub fn load() -> Self {
        let mut config = match load_config() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("using default configuration: {e}");
                ClientConfig::default()
            }
        };
        apply_fingerprint_override(&mut config, std::env::var(FINGERPRINT_ENV).ok());
        config
    }
}

/// Folds an externally supplied fingerprint into the config.
///
/// Blank values are ignored; non-blank values are trimmed and lowercased so
/// comparison against the computed digest is byte-exact.
fn apply_fingerprint_override(config: &mut ClientConfig, value: Option<String>) {
    if let Some(raw) = value {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.connection.fingerprint = Some(trimmed.to_ascii_lowercase());
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `ClientConfig` from disk, returning `ClientConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: ClientConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ChatOverTLS"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("chatovertls"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ChatOverTLS")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
