// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Byfrost platform.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Byfrost configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ByfrostConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP server bind settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Inbound webhook and outbound delivery settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Journey routing defaults.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Presence clock defaults (per-tenant journey config can override).
    #[serde(default)]
    pub presence: PresenceConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "byfrost".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Service bearer token for the `/v1/send` API. `None` rejects all
    /// send calls (fail-closed). Presence endpoints use per-employee tokens.
    #[serde(default)]
    pub api_bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "byfrost.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Inbound webhook and outbound delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Country calling code prepended to bare national numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,

    /// Window (seconds) for suppressing near-duplicate outbound captures.
    #[serde(default = "default_outbound_dedup_window")]
    pub outbound_dedup_window_secs: i64,

    /// Timeout (seconds) for external provider delivery attempts.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Provider send-API base URL. `None` degrades sends to "prepared but
    /// not sent".
    #[serde(default)]
    pub provider_api_url: Option<String>,

    /// Provider send-API token.
    #[serde(default)]
    pub provider_api_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
            outbound_dedup_window_secs: default_outbound_dedup_window(),
            delivery_timeout_secs: default_delivery_timeout(),
            provider_api_url: None,
            provider_api_token: None,
        }
    }
}

fn default_country_code() -> String {
    "55".to_string()
}

fn default_outbound_dedup_window() -> i64 {
    20
}

fn default_delivery_timeout() -> u64 {
    10
}

/// Journey routing defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Journey key used when neither the instance nor the tenant configures one.
    #[serde(default = "default_fallback_journey")]
    pub fallback_journey_key: String,

    /// Journey key reserved for vendor-role senders.
    #[serde(default = "default_vendor_journey")]
    pub vendor_journey_key: String,

    /// Auto-create customer contacts for unknown inbound senders.
    #[serde(default = "default_auto_create_customers")]
    pub auto_create_customers: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fallback_journey_key: default_fallback_journey(),
            vendor_journey_key: default_vendor_journey(),
            auto_create_customers: default_auto_create_customers(),
        }
    }
}

fn default_fallback_journey() -> String {
    "vendor_orders".to_string()
}

fn default_vendor_journey() -> String {
    "vendor_orders".to_string()
}

fn default_auto_create_customers() -> bool {
    true
}

/// Presence clock defaults. Tenant journey config JSON may override any of
/// these per tenant.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceConfig {
    /// Enable the presence clock endpoints and channel commands.
    #[serde(default)]
    pub enabled: bool,

    /// Geofence radius in meters around the configured workplace.
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,

    /// Workplace latitude. `None` disables geofence evaluation.
    #[serde(default)]
    pub workplace_latitude: Option<f64>,

    /// Workplace longitude.
    #[serde(default)]
    pub workplace_longitude: Option<f64>,

    /// Scheduled start of the working day, local wall time `HH:MM`.
    #[serde(default = "default_scheduled_start")]
    pub scheduled_start: String,

    /// Lateness tolerance in minutes after the scheduled start.
    #[serde(default = "default_tolerance_minutes")]
    pub tolerance_minutes: i64,

    /// Planned working minutes per day (drives the day-close delta).
    #[serde(default = "default_planned_minutes")]
    pub planned_minutes: i64,

    /// Standard UTC offset of the tenant zone, in minutes (e.g. -180).
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,

    /// UTC offset during the DST window, in minutes. `None` means no DST.
    #[serde(default)]
    pub dst_offset_minutes: Option<i32>,

    /// DST window start, `MM-DD` (inclusive).
    #[serde(default)]
    pub dst_start: Option<String>,

    /// DST window end, `MM-DD` (exclusive).
    #[serde(default)]
    pub dst_end: Option<String>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            radius_m: default_radius_m(),
            workplace_latitude: None,
            workplace_longitude: None,
            scheduled_start: default_scheduled_start(),
            tolerance_minutes: default_tolerance_minutes(),
            planned_minutes: default_planned_minutes(),
            utc_offset_minutes: default_utc_offset(),
            dst_offset_minutes: None,
            dst_start: None,
            dst_end: None,
        }
    }
}

fn default_radius_m() -> f64 {
    150.0
}

fn default_scheduled_start() -> String {
    "08:00".to_string()
}

fn default_tolerance_minutes() -> i64 {
    10
}

fn default_planned_minutes() -> i64 {
    480
}

fn default_utc_offset() -> i32 {
    -180
}
