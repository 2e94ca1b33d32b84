// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The presence clock: policy evaluation in front of the atomic punch,
//! justification, and day-close transactions.
//!
//! Punch submissions are never blocked. Rule violations (outside the
//! geofence, late arrival, missing break) are recorded as flagged punches
//! with required pendencies, and the case moves to PENDENTE_JUSTIFICATIVA
//! instead of rejecting the action.

use byfrost_config::model::PresenceConfig;
use byfrost_config::validation::{parse_month_day, parse_wall_time};
use byfrost_core::{ByfrostError, GeoPoint, PresenceState, PunchKind, PunchSource};
use byfrost_storage::ingest::{CaseSpec, PendencySpec};
use byfrost_storage::queries::presence as presence_queries;
use byfrost_storage::queries::presence::{CloseOutcome, PunchPlan, PunchResult, ResolveOutcome};
use byfrost_storage::Database;
use chrono::{DateTime, NaiveTime, Utc};
use tracing::debug;

use crate::geofence::GeofencePolicy;
use crate::schedule::{lateness_minutes, DstWindow, ZoneRule};

/// Pendency kind for a punch outside the workplace radius.
pub const PENDENCY_OUTSIDE_RADIUS: &str = "outside_radius";
/// Pendency kind for an ENTRY past the tolerance window.
pub const PENDENCY_LATE_ARRIVAL: &str = "late_arrival";
/// Pendency kind for a day closed without a complete break pair.
pub const PENDENCY_MISSING_BREAK: &str = "missing_break";

/// Evaluated presence policy for one tenant.
#[derive(Debug, Clone)]
pub struct PresencePolicy {
    pub geofence: Option<GeofencePolicy>,
    pub zone: ZoneRule,
    pub scheduled_start: NaiveTime,
    pub tolerance_minutes: i64,
    pub planned_minutes: i64,
}

impl PresencePolicy {
    /// Build the policy from the validated platform configuration.
    pub fn from_config(config: &PresenceConfig) -> Self {
        let (hour, minute) = parse_wall_time(&config.scheduled_start).unwrap_or((8, 0));
        let geofence = match (config.workplace_latitude, config.workplace_longitude) {
            (Some(latitude), Some(longitude)) => Some(GeofencePolicy {
                center: GeoPoint { latitude, longitude },
                radius_m: config.radius_m,
            }),
            _ => None,
        };
        let dst = match (
            config.dst_offset_minutes,
            config.dst_start.as_deref().and_then(parse_month_day),
            config.dst_end.as_deref().and_then(parse_month_day),
        ) {
            (Some(offset_minutes), Some(start), Some(end)) => Some(DstWindow {
                offset_minutes,
                start,
                end,
            }),
            _ => None,
        };
        Self {
            geofence,
            zone: ZoneRule {
                standard_offset_minutes: config.utc_offset_minutes,
                dst,
            },
            scheduled_start: NaiveTime::from_hms_opt(hour, minute, 0)
                .unwrap_or(NaiveTime::MIN),
            tolerance_minutes: config.tolerance_minutes,
            planned_minutes: config.planned_minutes,
        }
    }
}

/// Drives the presence state machine for one tenant journey.
pub struct PresenceClock {
    policy: PresencePolicy,
    journey_id: String,
}

impl PresenceClock {
    pub fn new(policy: PresencePolicy, journey_id: impl Into<String>) -> Self {
        Self {
            policy,
            journey_id: journey_id.into(),
        }
    }

    pub fn policy(&self) -> &PresencePolicy {
        &self.policy
    }

    /// Submit a punch for the employee's current local day.
    pub async fn punch(
        &self,
        db: &Database,
        tenant_id: &str,
        employee_id: &str,
        coords: Option<GeoPoint>,
        accuracy: Option<f64>,
        forced_kind: Option<PunchKind>,
        source: PunchSource,
    ) -> Result<PunchResult, ByfrostError> {
        self.punch_at(
            db,
            tenant_id,
            employee_id,
            coords,
            accuracy,
            forced_kind,
            source,
            Utc::now(),
        )
        .await
    }

    /// Submit a punch at an explicit instant. Used by tests and
    /// administrative backfills; `punch` is the live entry point.
    #[allow(clippy::too_many_arguments)]
    pub async fn punch_at(
        &self,
        db: &Database,
        tenant_id: &str,
        employee_id: &str,
        coords: Option<GeoPoint>,
        accuracy: Option<f64>,
        forced_kind: Option<PunchKind>,
        source: PunchSource,
        now: DateTime<Utc>,
    ) -> Result<PunchResult, ByfrostError> {
        let case_date = self.policy.zone.local_date(now).to_string();

        let evaluation = match (&self.policy.geofence, coords) {
            (Some(geofence), Some(point)) => Some(geofence.evaluate(point)),
            _ => None,
        };

        let late = lateness_minutes(
            now,
            self.policy.scheduled_start,
            self.policy.tolerance_minutes,
            &self.policy.zone,
        );

        let plan = PunchPlan {
            case: CaseSpec {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                journey_id: self.journey_id.clone(),
                case_type: "attendance".to_string(),
                initial_state: PresenceState::AguardandoEntrada.to_string(),
                channel: source.to_string(),
                opened_by: employee_id.to_string(),
                assignee_role: Some("employee".to_string()),
                metadata: None,
                case_date: Some(case_date),
            },
            punch_id: uuid::Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            forced_kind,
            latitude: coords.map(|p| p.latitude),
            longitude: coords.map(|p| p.longitude),
            accuracy,
            distance_m: evaluation.map(|e| e.distance_m),
            within_radius: evaluation.map(|e| e.within_radius),
            source: source.to_string(),
            late_pendency: late.map(|minutes| required_pendency(
                PENDENCY_LATE_ARRIVAL,
                format!("Entrada {minutes} minutos após o horário previsto. Justifique."),
            )),
            outside_pendency: evaluation
                .filter(|e| !e.within_radius)
                .map(|e| required_pendency(
                    PENDENCY_OUTSIDE_RADIUS,
                    format!(
                        "Ponto registrado a {:.0} m do local de trabalho. Justifique.",
                        e.distance_m
                    ),
                )),
            missing_break_pendency: Some(required_pendency(
                PENDENCY_MISSING_BREAK,
                "Dia encerrado sem intervalo registrado. Justifique.".to_string(),
            )),
        };

        debug!(
            tenant_id,
            employee_id,
            late = ?late,
            within_radius = ?evaluation.map(|e| e.within_radius),
            "punch submitted"
        );
        presence_queries::record_punch(db, plan).await
    }

    /// Answer a justification pendency, promoting the case to approval when
    /// it was the last one.
    pub async fn justify(
        &self,
        db: &Database,
        case_id: &str,
        pendency_id: &str,
        answer: &str,
    ) -> Result<ResolveOutcome, ByfrostError> {
        presence_queries::resolve_presence_pendency(
            db,
            case_id,
            pendency_id,
            answer,
            &uuid::Uuid::new_v4().to_string(),
        )
        .await
    }

    /// The human-gated day-close: post the minutes-delta to the hour ledger
    /// and move the case to FECHADO, or report why it is blocked.
    pub async fn close_day(
        &self,
        db: &Database,
        case_id: &str,
        note: Option<String>,
    ) -> Result<CloseOutcome, ByfrostError> {
        presence_queries::close_day(db, case_id, self.policy.planned_minutes, note).await
    }
}

fn required_pendency(kind: &str, question: String) -> PendencySpec {
    PendencySpec {
        id: uuid::Uuid::new_v4().to_string(),
        kind: kind.to_string(),
        required: true,
        assignee_role: Some("employee".to_string()),
        question: Some(question),
        expires_at: None,
    }
}
