// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Enum-like columns (direction, kind, status, state) are stored and carried
//! as their canonical string forms; the engines parse them into
//! `byfrost-core` enums at the decision boundary.

use serde::{Deserialize, Serialize};

/// A connected messaging channel (one phone number) owned by one tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: String,
    pub tenant_id: String,
    pub provider_id: String,
    pub phone: String,
    pub webhook_secret: String,
    pub business_flow_enabled: bool,
    pub audit_only: bool,
    pub default_journey_id: Option<String>,
    pub owner_user_id: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A reusable workflow definition (tenant-independent catalog entity).
#[derive(Debug, Clone, PartialEq)]
pub struct Journey {
    pub id: String,
    pub key: String,
    pub name: String,
    pub is_crm: bool,
    /// JSON array of state keys, ordered.
    pub states: String,
    pub default_state: Option<String>,
    /// JSON object of human-readable labels, optional.
    pub labels: Option<String>,
    pub created_at: String,
}

impl Journey {
    /// The ordered state keys declared by this journey.
    pub fn state_keys(&self) -> Vec<String> {
        serde_json::from_str(&self.states).unwrap_or_default()
    }

    /// True when `state` belongs to this journey's state list.
    pub fn has_state(&self, state: &str) -> bool {
        self.state_keys().iter().any(|s| s == state)
    }

    /// The state a new case starts in: configured default, else the first
    /// declared state.
    pub fn initial_state(&self) -> Option<String> {
        if let Some(ref default) = self.default_state {
            if self.has_state(default) {
                return Some(default.clone());
            }
        }
        self.state_keys().into_iter().next()
    }
}

/// Enables a journey for a tenant and carries tenant-specific configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantJourney {
    pub id: String,
    pub tenant_id: String,
    pub journey_id: String,
    /// JSON automation toggles; see `byfrost-journey::config`.
    pub config: String,
    pub position: i64,
    pub created_at: String,
}

/// The mutable conversation/workflow instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub id: String,
    pub tenant_id: String,
    pub journey_id: String,
    pub case_type: String,
    pub status: String,
    pub state: String,
    pub channel: String,
    pub opened_by: String,
    pub assignee_role: Option<String>,
    pub metadata: Option<String>,
    /// `YYYY-MM-DD` for day-scoped cases (attendance), else `None`.
    pub case_date: Option<String>,
    pub deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// An immutable record of one inbound or outbound communication.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: String,
    pub case_id: Option<String>,
    pub instance_id: String,
    pub direction: String,
    pub kind: String,
    pub from_phone: Option<String>,
    pub to_phone: Option<String>,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub external_id: Option<String>,
    pub correlation_id: String,
    pub raw_payload: Option<String>,
    pub created_at: String,
}

/// An open question/requirement blocking case progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Pendency {
    pub id: String,
    pub case_id: String,
    pub kind: String,
    pub required: bool,
    pub status: String,
    pub assignee_role: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub answered_at: Option<String>,
}

/// An immutable attendance event tied to one employee's daily case.
#[derive(Debug, Clone, PartialEq)]
pub struct TimePunch {
    pub id: String,
    pub case_id: String,
    pub employee_id: String,
    pub kind: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub distance_m: Option<f64>,
    pub within_radius: Option<bool>,
    pub source: String,
    pub forced: bool,
    pub created_at: String,
}

/// An appended correction record for a punch; the punch row itself is never
/// edited outside the explicit admin adjustment path.
#[derive(Debug, Clone, PartialEq)]
pub struct PunchAdjustment {
    pub id: String,
    pub punch_id: String,
    pub admin_id: String,
    pub reason: String,
    pub old_kind: String,
    pub new_kind: String,
    pub created_at: String,
}

/// One append-only bank-hour ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: i64,
    pub tenant_id: String,
    pub employee_id: String,
    pub case_id: String,
    pub minutes_delta: i64,
    pub balance_after: i64,
    pub note: Option<String>,
    pub created_at: String,
}

/// A phone-keyed identity scoped to a tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: String,
    pub tenant_id: String,
    pub phone: String,
    pub display_name: Option<String>,
    pub role: String,
    /// Bearer token for the presence endpoints (employees only).
    pub api_token: Option<String>,
    pub active: bool,
    pub created_at: String,
}

/// Diagnostic inbox record for one webhook invocation (insert shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxRecord {
    pub instance_id: Option<String>,
    pub direction: Option<String>,
    pub kind: Option<String>,
    pub from_phone: Option<String>,
    pub to_phone: Option<String>,
    pub correlation_id: Option<String>,
    pub outcome: String,
    pub reason: Option<String>,
    pub raw_payload: Option<String>,
}

/// A durable queued background job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: i64,
    pub kind: String,
    pub case_id: Option<String>,
    pub idempotency_key: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journey_with(states: &str, default_state: Option<&str>) -> Journey {
        Journey {
            id: "j1".to_string(),
            key: "vendor_orders".to_string(),
            name: "Vendor orders".to_string(),
            is_crm: false,
            states: states.to_string(),
            default_state: default_state.map(|s| s.to_string()),
            labels: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn journey_initial_state_prefers_valid_default() {
        let j = journey_with(r#"["novo","em_andamento","finalizado"]"#, Some("em_andamento"));
        assert_eq!(j.initial_state().as_deref(), Some("em_andamento"));
    }

    #[test]
    fn journey_initial_state_falls_back_to_first_declared() {
        let j = journey_with(r#"["novo","finalizado"]"#, Some("nonexistent"));
        assert_eq!(j.initial_state().as_deref(), Some("novo"));

        let j = journey_with(r#"["novo","finalizado"]"#, None);
        assert_eq!(j.initial_state().as_deref(), Some("novo"));
    }

    #[test]
    fn journey_with_garbled_states_yields_none() {
        let j = journey_with("not json", None);
        assert!(j.state_keys().is_empty());
        assert!(j.initial_state().is_none());
    }
}
