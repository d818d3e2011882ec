//! TOML-based configuration for the messaging client.
//!
//! The default location is the platform config directory:
//! - Windows:  `%APPDATA%\UnityMessaging\config.toml`
//! - Linux:    `~/.config/unity-messaging/config.toml`
//! - macOS:    `~/Library/Application Support/UnityMessaging/config.toml`
//!
//! Every field carries a `#[serde(default = ...)]`, so a missing file, an
//! empty file, or a file written by an older version all load cleanly:
//!
//! ```toml
//! log_level = "debug"
//!
//! [heartbeat]
//! relaxed_interval_ms = 4000
//! ```
//!
//! The on-disk shape uses plain millisecond integers.  [`MessagingConfig::to_settings`]
//! validates it and turns it into the `Duration`-based
//! [`ClientSettings`](crate::application::settings::ClientSettings) the client
//! runs with.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unity_messaging_core::{MessageType, MESSAGING_BASE_PORT};

use crate::application::{heartbeat::HeartbeatSettings, settings::ClientSettings};

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

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field parsed but holds a value the client cannot use.
    #[error("invalid value {value:?} for `{field}`")]
    InvalidValue { field: &'static str, value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagingConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Host the editor listens on.
    #[serde(default = "default_peer_host")]
    pub peer_host: String,
    #[serde(default = "default_messaging_base_port")]
    pub messaging_base_port: u16,
    /// Default `request_state` timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// Heartbeat intervals in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatConfig {
    #[serde(default = "default_aggressive_interval_ms")]
    pub aggressive_interval_ms: u64,
    #[serde(default = "default_relax_delay_ms")]
    pub relax_delay_ms: u64,
    #[serde(default = "default_relaxed_interval_ms")]
    pub relaxed_interval_ms: u64,
    #[serde(default = "default_custom_peer_relaxed_interval_ms")]
    pub custom_peer_relaxed_interval_ms: u64,
}

/// UDP ceiling and TCP fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Frames of this size or larger are sent over TCP.
    #[serde(default = "default_udp_ceiling_bytes")]
    pub udp_ceiling_bytes: usize,
    #[serde(default = "default_tcp_timeout_ms")]
    pub tcp_timeout_ms: u64,
}

/// Minimum interval between two sends of each throttled command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    #[serde(default = "default_execute_tests_ms")]
    pub execute_tests_ms: u64,
    #[serde(default = "default_retrieve_test_list_ms")]
    pub retrieve_test_list_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_peer_host() -> String {
    "127.0.0.1".to_string()
}
fn default_messaging_base_port() -> u16 {
    MESSAGING_BASE_PORT
}
fn default_request_timeout_ms() -> u64 {
    1000
}
fn default_aggressive_interval_ms() -> u64 {
    500
}
fn default_relax_delay_ms() -> u64 {
    2000
}
fn default_relaxed_interval_ms() -> u64 {
    3000
}
fn default_custom_peer_relaxed_interval_ms() -> u64 {
    5000
}
fn default_udp_ceiling_bytes() -> usize {
    8192
}
fn default_tcp_timeout_ms() -> u64 {
    5000
}
fn default_refresh_ms() -> u64 {
    2000
}
fn default_execute_tests_ms() -> u64 {
    1000
}
fn default_retrieve_test_list_ms() -> u64 {
    1000
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            peer_host: default_peer_host(),
            messaging_base_port: default_messaging_base_port(),
            request_timeout_ms: default_request_timeout_ms(),
            heartbeat: HeartbeatConfig::default(),
            transport: TransportConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            aggressive_interval_ms: default_aggressive_interval_ms(),
            relax_delay_ms: default_relax_delay_ms(),
            relaxed_interval_ms: default_relaxed_interval_ms(),
            custom_peer_relaxed_interval_ms: default_custom_peer_relaxed_interval_ms(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            udp_ceiling_bytes: default_udp_ceiling_bytes(),
            tcp_timeout_ms: default_tcp_timeout_ms(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            execute_tests_ms: default_execute_tests_ms(),
            retrieve_test_list_ms: default_retrieve_test_list_ms(),
        }
    }
}

impl MessagingConfig {
    /// Validates the file values and converts them to runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparsable host, a zero
    /// heartbeat interval, or a UDP ceiling smaller than a frame header.
    pub fn to_settings(&self) -> Result<ClientSettings, ConfigError> {
        let peer_host: IpAddr = self.peer_host.parse().map_err(|_| ConfigError::InvalidValue {
            field: "peer_host",
            value: self.peer_host.clone(),
        })?;

        let hb = &self.heartbeat;
        for (field, value) in [
            ("heartbeat.aggressive_interval_ms", hb.aggressive_interval_ms),
            ("heartbeat.relaxed_interval_ms", hb.relaxed_interval_ms),
            ("heartbeat.custom_peer_relaxed_interval_ms", hb.custom_peer_relaxed_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    value: value.to_string(),
                });
            }
        }

        if self.transport.udp_ceiling_bytes <= unity_messaging_core::protocol::messages::HEADER_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "transport.udp_ceiling_bytes",
                value: self.transport.udp_ceiling_bytes.to_string(),
            });
        }

        let limits = &self.rate_limits;
        Ok(ClientSettings {
            peer_host,
            messaging_base_port: self.messaging_base_port,
            heartbeat: HeartbeatSettings {
                aggressive_interval: Duration::from_millis(hb.aggressive_interval_ms),
                relax_delay: Duration::from_millis(hb.relax_delay_ms),
                relaxed_interval: Duration::from_millis(hb.relaxed_interval_ms),
                custom_peer_relaxed_interval: Duration::from_millis(hb.custom_peer_relaxed_interval_ms),
            },
            udp_ceiling: self.transport.udp_ceiling_bytes,
            tcp_timeout: Duration::from_millis(self.transport.tcp_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            rate_limits: vec![
                (MessageType::Refresh, Duration::from_millis(limits.refresh_ms)),
                (MessageType::ExecuteTests, Duration::from_millis(limits.execute_tests_ms)),
                (
                    MessageType::RetrieveTestList,
                    Duration::from_millis(limits.retrieve_test_list_ms),
                ),
            ],
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(dir.join("config.toml"))
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<MessagingConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MessagingConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &MessagingConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("UnityMessaging"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("unity-messaging"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("UnityMessaging")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
