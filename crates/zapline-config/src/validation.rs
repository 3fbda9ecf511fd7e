// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization.
//!
//! Every violation is collected; validation never stops at the first one.

use crate::diagnostic::ConfigError;
use crate::model::{SessionBackend, ZaplineConfig};

/// Validate a deserialized configuration, returning every violation found.
pub fn validate_config(config: &ZaplineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.manager.event_capacity == 0 {
        errors.push(ConfigError::validation(
            "manager.event_capacity must be greater than 0",
        ));
    }

    if !matches!(
        config.manager.log_level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ConfigError::validation(format!(
            "manager.log_level `{}` is not one of trace, debug, info, warn, error",
            config.manager.log_level
        )));
    }

    let reconnect = &config.reconnect;
    if reconnect.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "reconnect.max_attempts must be at least 1",
        ));
    }
    if reconnect.initial_delay_ms == 0 {
        errors.push(ConfigError::validation(
            "reconnect.initial_delay_ms must be greater than 0",
        ));
    }
    if !reconnect.multiplier.is_finite() || reconnect.multiplier < 1.0 {
        errors.push(ConfigError::validation(format!(
            "reconnect.multiplier must be a finite number >= 1.0, got {}",
            reconnect.multiplier
        )));
    }
    if reconnect.max_delay_ms < reconnect.initial_delay_ms {
        errors.push(ConfigError::validation(format!(
            "reconnect.max_delay_ms ({}) must not be less than reconnect.initial_delay_ms ({})",
            reconnect.max_delay_ms, reconnect.initial_delay_ms
        )));
    }

    match config.session.backend {
        SessionBackend::Filesystem if config.session.directory.trim().is_empty() => {
            errors.push(ConfigError::validation(
                "session.directory must not be empty when session.backend = \"filesystem\"",
            ));
        }
        SessionBackend::Sqlite if config.session.database_path.trim().is_empty() => {
            errors.push(ConfigError::validation(
                "session.database_path must not be empty when session.backend = \"sqlite\"",
            ));
        }
        _ => {}
    }

    let media = &config.media;
    if media.enabled {
        if media.directory.trim().is_empty() {
            errors.push(ConfigError::validation(
                "media.directory must not be empty when media is enabled",
            ));
        }
        if media.base_url.trim().is_empty() {
            errors.push(ConfigError::validation(
                "media.base_url must not be empty when media is enabled",
            ));
        }
        if media.ttl_hours == 0 {
            errors.push(ConfigError::validation(
                "media.ttl_hours must be greater than 0",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ZaplineConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_reconnect_violation() {
        let mut config = ZaplineConfig::default();
        config.reconnect.max_attempts = 0;
        config.reconnect.multiplier = 0.5;
        config.reconnect.initial_delay_ms = 10_000;
        config.reconnect.max_delay_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn disabled_media_skips_media_checks() {
        let mut config = ZaplineConfig::default();
        config.media.enabled = false;
        config.media.base_url = String::new();
        config.media.ttl_hours = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn sqlite_backend_requires_database_path() {
        let mut config = ZaplineConfig::default();
        config.session.backend = SessionBackend::Sqlite;
        config.session.database_path = "  ".to_string();
        config.session.directory = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("session.database_path"));
    }
}
