// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Zapline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Zapline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZaplineConfig {
    /// Deployment environment and manager behavior.
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Backoff policy for transient disconnections.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Credential persistence backend.
    #[serde(default)]
    pub session: SessionConfig,

    /// Local storage of inbound media.
    #[serde(default)]
    pub media: MediaConfig,
}

/// Deployment environment. Anything but `development` requires a pluggable session store.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Manager behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Capacity of the lifecycle/message event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: default_log_level(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

/// Exponential backoff for reconnecting after transient closures.
///
/// The delay before attempt `n` is `min(initial_delay_ms * multiplier^(n-1), max_delay_ms)`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    /// Attempts before the instance is left disconnected.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor between consecutive attempts.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound of any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    2_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

/// Which session store backend to build from configuration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionBackend {
    /// One directory per instance. Development and single-node only.
    #[default]
    Filesystem,
    /// SQLite database, injectable as the pluggable store.
    Sqlite,
}

/// Session credential persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,

    /// Root directory of the filesystem store.
    #[serde(default = "default_session_directory")]
    pub directory: String,

    /// Path to the SQLite database file of the sqlite store.
    #[serde(default = "default_session_database_path")]
    pub database_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            directory: default_session_directory(),
            database_path: default_session_database_path(),
        }
    }
}

fn data_path(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("zapline").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}

fn default_session_directory() -> String {
    data_path("sessions")
}

fn default_session_database_path() -> String {
    data_path("sessions.db")
}

/// Inbound media storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Download and store inbound media. When disabled, media messages carry no attachment.
    #[serde(default = "default_media_enabled")]
    pub enabled: bool,

    /// Directory stored media is written to.
    #[serde(default = "default_media_directory")]
    pub directory: String,

    /// Public URL prefix under which the directory is served.
    #[serde(default = "default_media_base_url")]
    pub base_url: String,

    /// Hours until stored media is reported as expired.
    #[serde(default = "default_media_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: default_media_enabled(),
            directory: default_media_directory(),
            base_url: default_media_base_url(),
            ttl_hours: default_media_ttl_hours(),
        }
    }
}

fn default_media_enabled() -> bool {
    true
}

fn default_media_directory() -> String {
    data_path("media")
}

fn default_media_base_url() -> String {
    "http://127.0.0.1:8080/media".to_string()
}

fn default_media_ttl_hours() -> u64 {
    24
}
