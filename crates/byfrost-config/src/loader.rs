// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./byfrost.toml` > `~/.config/byfrost/byfrost.toml`
//! > `/etc/byfrost/byfrost.toml` with environment variable overrides via
//! `BYFROST_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ByfrostConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/byfrost/byfrost.toml` (system-wide)
/// 3. `~/.config/byfrost/byfrost.toml` (user XDG config)
/// 4. `./byfrost.toml` (local directory)
/// 5. `BYFROST_*` environment variables
pub fn load_config() -> Result<ByfrostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ByfrostConfig::default()))
        .merge(Toml::file("/etc/byfrost/byfrost.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("byfrost/byfrost.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("byfrost.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ByfrostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ByfrostConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ByfrostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ByfrostConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `BYFROST_WEBHOOK_DELIVERY_TIMEOUT_SECS`
/// must map to `webhook.delivery_timeout_secs`, not `webhook.delivery.timeout.secs`.
fn env_provider() -> Env {
    Env::prefixed("BYFROST_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("webhook_", "webhook.", 1)
            .replacen("routing_", "routing.", 1)
            .replacen("presence_", "presence.", 1);
        mapped.into()
    })
}
