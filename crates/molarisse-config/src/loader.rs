// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./molarisse.toml` > `~/.config/molarisse/molarisse.toml`
//! > `/etc/molarisse/molarisse.toml`, with environment variable overrides via the
//! `MOLARISSE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MolarisseConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/molarisse/molarisse.toml";
pub(crate) const LOCAL_CONFIG: &str = "molarisse.toml";

/// Top-level sections, used to split `MOLARISSE_<SECTION>_<KEY>` variables.
const SECTIONS: &[&str] = &["api", "sync", "media", "session", "log"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("molarisse/molarisse.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/molarisse/molarisse.toml`
/// 3. `~/.config/molarisse/molarisse.toml`
/// 4. `./molarisse.toml`
/// 5. `MOLARISSE_*` environment variables
pub fn load_config() -> Result<MolarisseConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MolarisseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MolarisseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MolarisseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MolarisseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MolarisseConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `MOLARISSE_API_AUTH_TOKEN` must become `api.auth_token`,
/// not `api.auth.token`.
fn env_provider() -> Env {
    Env::prefixed("MOLARISSE_").map(|key| env_key_to_path(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped variable name to a dotted config path.
pub fn env_key_to_path(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
