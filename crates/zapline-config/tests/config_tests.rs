// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Zapline configuration system.

use zapline_config::diagnostic::ConfigError;
use zapline_config::model::{Environment, SessionBackend};
use zapline_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_document_deserializes() {
    let toml = r#"
[manager]
environment = "staging"
log_level = "debug"
event_capacity = 64

[reconnect]
max_attempts = 5
initial_delay_ms = 500
multiplier = 1.5
max_delay_ms = 10000

[session]
backend = "sqlite"
database_path = "/var/lib/zapline/sessions.db"

[media]
enabled = true
directory = "/var/lib/zapline/media"
base_url = "https://cdn.example.com/media"
ttl_hours = 48
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.manager.environment, Environment::Staging);
    assert_eq!(config.manager.log_level, "debug");
    assert_eq!(config.manager.event_capacity, 64);
    assert_eq!(config.reconnect.max_attempts, 5);
    assert_eq!(config.reconnect.initial_delay_ms, 500);
    assert_eq!(config.reconnect.multiplier, 1.5);
    assert_eq!(config.reconnect.max_delay_ms, 10_000);
    assert_eq!(config.session.backend, SessionBackend::Sqlite);
    assert_eq!(config.session.database_path, "/var/lib/zapline/sessions.db");
    assert_eq!(config.media.base_url, "https://cdn.example.com/media");
    assert_eq!(config.media.ttl_hours, 48);
}

#[test]
fn empty_document_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.manager.environment, Environment::Development);
    assert_eq!(config.reconnect.max_attempts, 10);
    assert_eq!(config.session.backend, SessionBackend::Filesystem);
}

#[test]
fn unknown_key_is_rejected_with_suggestion() {
    let toml = r#"
[reconnect]
max_atempts = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_atempts");
            assert_eq!(suggestion.as_deref(), Some("max_attempts"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telegram]\nbot_token = \"x\"\n").expect_err("unknown section");
    assert!(err.to_string().contains("telegram"), "got: {err}");
}

#[test]
fn unknown_backend_is_reported() {
    let errors = load_and_validate_str("[session]\nbackend = \"redis\"\n").expect_err("bad enum");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. })),
        "got: {errors:?}"
    );
}

#[test]
fn wrong_type_is_reported() {
    let errors =
        load_and_validate_str("[reconnect]\nmax_attempts = \"many\"\n").expect_err("bad type");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_violations_are_all_reported() {
    let toml = r#"
[manager]
event_capacity = 0

[reconnect]
multiplier = 0.5
"#;

    let errors = load_and_validate_str(toml).expect_err("invalid values");
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}
