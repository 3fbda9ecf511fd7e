// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later wins): compiled defaults, `/etc/zapline/zapline.toml`,
//! `~/.config/zapline/zapline.toml`, `./zapline.toml`, then `ZAPLINE_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ZaplineConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/zapline/zapline.toml";
pub(crate) const LOCAL_CONFIG: &str = "zapline.toml";

/// Sections recognized in `ZAPLINE_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &["manager", "reconnect", "session", "media"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("zapline").join("zapline.toml"))
}

/// Figment with every layer of the standard hierarchy, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(ZaplineConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG)).merge(env_provider())
}

/// Load configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<ZaplineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<ZaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZaplineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file, still honoring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<ZaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZaplineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// `ZAPLINE_RECONNECT_MAX_DELAY_MS` maps to `reconnect.max_delay_ms`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys containing underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("ZAPLINE_").map(|key| {
        let key = key.as_str();
        ENV_SECTIONS
            .iter()
            .find_map(|section| {
                key.strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|field| format!("{section}.{field}"))
            })
            .unwrap_or_else(|| key.to_string())
            .into()
    })
}
