// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, sane geofence radii, and
//! well-formed wall-clock and DST-window strings.

use crate::diagnostic::ConfigError;
use crate::model::ByfrostConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ByfrostConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if !config
        .webhook
        .default_country_code
        .chars()
        .all(|c| c.is_ascii_digit())
        || config.webhook.default_country_code.is_empty()
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "webhook.default_country_code must be digits, got `{}`",
                config.webhook.default_country_code
            ),
        });
    }

    if config.webhook.outbound_dedup_window_secs < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "webhook.outbound_dedup_window_secs must be non-negative, got {}",
                config.webhook.outbound_dedup_window_secs
            ),
        });
    }

    if config.routing.fallback_journey_key.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "routing.fallback_journey_key must not be empty".to_string(),
        });
    }

    if config.presence.radius_m <= 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "presence.radius_m must be positive, got {}",
                config.presence.radius_m
            ),
        });
    }

    if config.presence.tolerance_minutes < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "presence.tolerance_minutes must be non-negative, got {}",
                config.presence.tolerance_minutes
            ),
        });
    }

    if parse_wall_time(&config.presence.scheduled_start).is_none() {
        errors.push(ConfigError::Validation {
            message: format!(
                "presence.scheduled_start must be `HH:MM`, got `{}`",
                config.presence.scheduled_start
            ),
        });
    }

    // A DST offset without a window (or vice versa) is a misconfiguration.
    let dst_parts = [
        config.presence.dst_offset_minutes.is_some(),
        config.presence.dst_start.is_some(),
        config.presence.dst_end.is_some(),
    ];
    if dst_parts.iter().any(|&p| p) && !dst_parts.iter().all(|&p| p) {
        errors.push(ConfigError::Validation {
            message: "presence.dst_offset_minutes, dst_start, and dst_end must be set together"
                .to_string(),
        });
    }
    for (key, value) in [
        ("dst_start", &config.presence.dst_start),
        ("dst_end", &config.presence.dst_end),
    ] {
        if let Some(v) = value
            && parse_month_day(v).is_none()
        {
            errors.push(ConfigError::Validation {
                message: format!("presence.{key} must be `MM-DD`, got `{v}`"),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Parse an `HH:MM` wall-clock string into (hour, minute).
pub fn parse_wall_time(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// Parse an `MM-DD` calendar string into (month, day).
pub fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let (m, d) = s.split_once('-')?;
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    ((1..=12).contains(&month) && (1..=31).contains(&day)).then_some((month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ByfrostConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut config = ByfrostConfig::default();
        config.server.host = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("server.host")));
    }

    #[test]
    fn non_digit_country_code_is_rejected() {
        let mut config = ByfrostConfig::default();
        config.webhook.default_country_code = "+55".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn partial_dst_window_is_rejected() {
        let mut config = ByfrostConfig::default();
        config.presence.dst_offset_minutes = Some(-120);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("together")));
    }

    #[test]
    fn wall_time_parsing() {
        assert_eq!(parse_wall_time("08:00"), Some((8, 0)));
        assert_eq!(parse_wall_time("23:59"), Some((23, 59)));
        assert_eq!(parse_wall_time("24:00"), None);
        assert_eq!(parse_wall_time("8am"), None);
    }

    #[test]
    fn month_day_parsing() {
        assert_eq!(parse_month_day("10-15"), Some((10, 15)));
        assert_eq!(parse_month_day("02-30"), Some((2, 30))); // calendar sanity is the zone rule's problem
        assert_eq!(parse_month_day("13-01"), None);
        assert_eq!(parse_month_day("oct-15"), None);
    }
}
