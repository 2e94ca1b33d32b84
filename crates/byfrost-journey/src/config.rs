// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-journey automation configuration.
//!
//! Parsed from the `tenant_journeys.config` JSON column. Unknown or garbled
//! config degrades to defaults rather than failing ingestion.

use std::collections::BTreeMap;

use byfrost_core::MessageKind;
use serde::{Deserialize, Serialize};

/// Automation toggles for one (tenant, journey) enablement.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TenantJourneyConfig {
    /// Enqueue OCR extraction jobs for inbound images.
    pub ocr_enabled: bool,

    /// Create the default pendencies (`need_location`, `need_more_pages`)
    /// on the first inbound image.
    pub default_pendencies: bool,

    /// Deadline for default pendencies, in hours from creation.
    pub pendency_expiry_hours: i64,

    /// Message kinds allowed to open a case.
    pub create_on: CreateOn,

    /// Initial case state per message kind, overriding the journey default.
    /// Hints naming states the journey does not declare are ignored.
    pub initial_states: BTreeMap<String, String>,

    /// State to transition to when a location message arrives.
    pub location_next_state: Option<String>,

    /// Treat vendor-role senders as exclusive to this journey.
    pub vendor_only: bool,

    /// Enable the presence clock for this tenant journey.
    pub presence_enabled: bool,
}

/// Which message kinds may open a case.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CreateOn {
    pub text: bool,
    pub image: bool,
    pub location: bool,
    pub audio: bool,
    pub video: bool,
    pub document: bool,
}

impl Default for CreateOn {
    fn default() -> Self {
        Self {
            text: true,
            image: true,
            location: false,
            audio: true,
            video: false,
            document: true,
        }
    }
}

impl Default for TenantJourneyConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: false,
            default_pendencies: false,
            pendency_expiry_hours: 24,
            create_on: CreateOn::default(),
            initial_states: BTreeMap::new(),
            location_next_state: None,
            vendor_only: false,
            presence_enabled: false,
        }
    }
}

impl TenantJourneyConfig {
    /// Parse from the stored JSON column, degrading to defaults on garbage.
    pub fn parse(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_default()
    }

    /// True when the given message kind may open a new case.
    pub fn allows_case_creation(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::Text => self.create_on.text,
            MessageKind::Image => self.create_on.image,
            MessageKind::Location => self.create_on.location,
            MessageKind::Audio => self.create_on.audio,
            MessageKind::Video => self.create_on.video,
            MessageKind::Document => self.create_on.document,
        }
    }

    /// The configured initial-state hint for a message kind, if any.
    pub fn initial_state_hint(&self, kind: MessageKind) -> Option<&str> {
        self.initial_states.get(&kind.to_string()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_text_and_image_but_not_location() {
        let config = TenantJourneyConfig::default();
        assert!(config.allows_case_creation(MessageKind::Text));
        assert!(config.allows_case_creation(MessageKind::Image));
        assert!(!config.allows_case_creation(MessageKind::Location));
        assert!(!config.ocr_enabled);
        assert!(!config.presence_enabled);
    }

    #[test]
    fn parse_reads_partial_config() {
        let config = TenantJourneyConfig::parse(
            r#"{"ocr_enabled": true, "initial_states": {"image": "aguardando_paginas"}}"#,
        );
        assert!(config.ocr_enabled);
        assert_eq!(
            config.initial_state_hint(MessageKind::Image),
            Some("aguardando_paginas")
        );
        assert!(config.initial_state_hint(MessageKind::Text).is_none());
        // Untouched sections keep their defaults.
        assert!(config.create_on.text);
        assert_eq!(config.pendency_expiry_hours, 24);
    }

    #[test]
    fn garbled_config_degrades_to_defaults() {
        let config = TenantJourneyConfig::parse("not json at all");
        assert!(!config.ocr_enabled);
        assert!(config.create_on.text);
    }
}
