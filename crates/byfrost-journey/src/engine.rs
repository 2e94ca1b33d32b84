// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The case state engine.
//!
//! Computes, as a pure decision over current store state, everything one
//! message does to its case: find-or-create, the per-kind transition rules,
//! pendency creation and answering, and follow-up job enqueues. The
//! resulting [`InboundPlan`] is applied atomically by
//! `byfrost_storage::ingest::apply_inbound`.

use byfrost_core::{ByfrostError, Direction, MessageKind, NormalizedMessage};
use byfrost_ingest::SenderIdentity;
use byfrost_storage::ingest::{
    AnswerSpec, CaseDisposition, CaseSpec, InboundPlan, JobSpec, MessageSpec, PendencySpec,
};
use byfrost_storage::queries::cases;
use byfrost_storage::{Database, Instance};
use tracing::debug;

use crate::router::RouteDecision;

/// Pendency kind asking the sender for a delivery location.
pub const PENDENCY_NEED_LOCATION: &str = "need_location";
/// Pendency kind asking the sender for the remaining document pages.
pub const PENDENCY_NEED_MORE_PAGES: &str = "need_more_pages";

/// Builds inbound plans for the atomic ingest transaction.
pub struct CaseEngine {
    outbound_dedup_window_secs: i64,
}

impl CaseEngine {
    pub fn new(outbound_dedup_window_secs: i64) -> Self {
        Self {
            outbound_dedup_window_secs,
        }
    }

    /// Compute the plan for one normalized message.
    ///
    /// Inbound messages reuse the newest open case for the sender within the
    /// routed journey, create one when tenant config permits it for the
    /// message kind, or fall through to an unlinked write. Outbound captures
    /// are linked best-effort by recipient; unlinked is a normal outcome.
    pub async fn plan(
        &self,
        db: &Database,
        instance: &Instance,
        decision: &RouteDecision,
        sender: &SenderIdentity,
        msg: &NormalizedMessage,
        direction: Direction,
        correlation_id: &str,
        raw_payload: Option<String>,
    ) -> Result<InboundPlan, ByfrostError> {
        let message = MessageSpec {
            id: uuid::Uuid::new_v4().to_string(),
            instance_id: instance.id.clone(),
            direction: direction.to_string(),
            kind: msg.kind.to_string(),
            from_phone: msg.from.clone(),
            to_phone: msg.to.clone(),
            body: msg.text.clone(),
            media_url: msg.media_url.clone(),
            external_id: msg.external_id.clone(),
            correlation_id: correlation_id.to_string(),
            raw_payload,
        };

        if direction == Direction::Outbound {
            return self.plan_outbound(db, instance, decision, message).await;
        }

        // A sender we cannot name at all cannot drive a workflow.
        let opened_by = sender
            .contact
            .as_ref()
            .map(|c| c.phone.clone())
            .or_else(|| msg.from.clone())
            .ok_or_else(|| ByfrostError::Rule("no_identifiable_sender".to_string()))?;

        let existing =
            cases::latest_open_case(db, &instance.tenant_id, &decision.journey.id, &opened_by)
                .await?;

        let case = match existing {
            Some(case) => CaseDisposition::Reuse(case.id),
            None if decision.config.allows_case_creation(msg.kind) => {
                let initial_state = decision
                    .config
                    .initial_state_hint(msg.kind)
                    .filter(|hint| decision.journey.has_state(hint))
                    .map(|s| s.to_string())
                    .or_else(|| decision.journey.initial_state())
                    .ok_or_else(|| {
                        ByfrostError::Routing(format!(
                            "journey `{}` declares no states",
                            decision.journey.key
                        ))
                    })?;
                CaseDisposition::Create(CaseSpec {
                    id: uuid::Uuid::new_v4().to_string(),
                    tenant_id: instance.tenant_id.clone(),
                    journey_id: decision.journey.id.clone(),
                    case_type: "conversation".to_string(),
                    initial_state,
                    channel: "whatsapp".to_string(),
                    opened_by: opened_by.clone(),
                    assignee_role: sender.role.map(|r| r.to_string()),
                    metadata: sender.contact.as_ref().and_then(|c| {
                        c.display_name.as_ref().map(|name| {
                            serde_json::json!({ "sender_name": name }).to_string()
                        })
                    }),
                    case_date: None,
                })
            }
            None => {
                debug!(
                    kind = %msg.kind,
                    journey = decision.journey.key.as_str(),
                    "case creation disabled for kind; storing unlinked"
                );
                CaseDisposition::Unlinked
            }
        };

        let mut plan = InboundPlan {
            case,
            message,
            set_state: None,
            merge_metadata: None,
            pendencies: Vec::new(),
            answer: None,
            jobs: Vec::new(),
            outbound_dedup_window_secs: None,
        };
        self.apply_kind_rules(&mut plan, decision, sender, msg, correlation_id);
        Ok(plan)
    }

    async fn plan_outbound(
        &self,
        db: &Database,
        instance: &Instance,
        decision: &RouteDecision,
        message: MessageSpec,
    ) -> Result<InboundPlan, ByfrostError> {
        // Best-effort case linking by recipient: there is no authoritative
        // foreign key at send time, and "unlinked" is a normal outcome.
        let case = match message.to_phone.as_deref() {
            Some(to) => {
                match cases::latest_open_case(db, &instance.tenant_id, &decision.journey.id, to)
                    .await?
                {
                    Some(case) => CaseDisposition::Reuse(case.id),
                    None => CaseDisposition::Unlinked,
                }
            }
            None => CaseDisposition::Unlinked,
        };

        Ok(InboundPlan {
            case,
            message,
            set_state: None,
            merge_metadata: None,
            pendencies: Vec::new(),
            answer: None,
            jobs: Vec::new(),
            outbound_dedup_window_secs: Some(self.outbound_dedup_window_secs),
        })
    }

    /// The per-kind transition rules.
    fn apply_kind_rules(
        &self,
        plan: &mut InboundPlan,
        decision: &RouteDecision,
        sender: &SenderIdentity,
        msg: &NormalizedMessage,
        correlation_id: &str,
    ) {
        if matches!(plan.case, CaseDisposition::Unlinked) {
            return;
        }
        let config = &decision.config;

        match msg.kind {
            MessageKind::Image => {
                if config.default_pendencies {
                    let expires_at = pendency_deadline(config.pendency_expiry_hours);
                    let role = sender.role.map(|r| r.to_string());
                    plan.pendencies.push(PendencySpec {
                        id: uuid::Uuid::new_v4().to_string(),
                        kind: PENDENCY_NEED_LOCATION.to_string(),
                        required: false,
                        assignee_role: role.clone(),
                        question: Some("Qual o local de entrega?".to_string()),
                        expires_at: Some(expires_at.clone()),
                    });
                    plan.pendencies.push(PendencySpec {
                        id: uuid::Uuid::new_v4().to_string(),
                        kind: PENDENCY_NEED_MORE_PAGES.to_string(),
                        required: false,
                        assignee_role: role,
                        question: Some("O pedido tem mais páginas?".to_string()),
                        expires_at: Some(expires_at),
                    });
                    plan.jobs.push(JobSpec {
                        kind: "pendency_prompt".to_string(),
                        idempotency_key: format!("prompt:{correlation_id}"),
                        payload: serde_json::json!({ "correlation_id": correlation_id })
                            .to_string(),
                    });
                }
                if config.ocr_enabled {
                    plan.jobs.push(JobSpec {
                        kind: "ocr_extract".to_string(),
                        idempotency_key: format!("ocr:{correlation_id}"),
                        payload: serde_json::json!({
                            "correlation_id": correlation_id,
                            "media_url": msg.media_url,
                        })
                        .to_string(),
                    });
                }
            }
            MessageKind::Location => {
                if let Some(location) = msg.location {
                    plan.merge_metadata = Some(serde_json::json!({
                        "delivery_location": {
                            "latitude": location.latitude,
                            "longitude": location.longitude,
                        }
                    }));
                }
                plan.set_state = config
                    .location_next_state
                    .as_deref()
                    .filter(|state| decision.journey.has_state(state))
                    .map(|s| s.to_string());
            }
            MessageKind::Text | MessageKind::Audio => {
                if let Some(text) = msg.text.clone().filter(|t| !t.trim().is_empty()) {
                    plan.answer = Some(AnswerSpec {
                        role: sender.role.map(|r| r.to_string()),
                        answer: text,
                    });
                }
            }
            MessageKind::Video | MessageKind::Document => {}
        }
    }
}

/// Deadline `hours` from now, in the stored timestamp format.
fn pendency_deadline(hours: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::hours(hours))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenantJourneyConfig;
    use byfrost_core::ContactRole;
    use byfrost_storage::ingest::apply_inbound;
    use byfrost_storage::queries::{instances, journeys, messages, pendencies, timeline};
    use byfrost_storage::{Contact, Journey};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        journeys::insert_journey(
            &db,
            &Journey {
                id: "j1".to_string(),
                key: "vendor_orders".to_string(),
                name: "Vendor orders".to_string(),
                is_crm: false,
                states: r#"["novo","aguardando_local","em_separacao","finalizado"]"#.to_string(),
                default_state: Some("novo".to_string()),
                labels: None,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
        )
        .await
        .unwrap();
        let instance = test_instance();
        instances::insert_instance(&db, &instance).await.unwrap();
        (db, dir)
    }

    fn test_instance() -> Instance {
        Instance {
            id: "i1".to_string(),
            tenant_id: "t1".to_string(),
            provider_id: "wa-1".to_string(),
            phone: "+5511988880000".to_string(),
            webhook_secret: "s".to_string(),
            business_flow_enabled: true,
            audit_only: false,
            default_journey_id: Some("j1".to_string()),
            owner_user_id: None,
            active: true,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    fn decision(config: TenantJourneyConfig) -> RouteDecision {
        RouteDecision {
            journey: Journey {
                id: "j1".to_string(),
                key: "vendor_orders".to_string(),
                name: "Vendor orders".to_string(),
                is_crm: false,
                states: r#"["novo","aguardando_local","em_separacao","finalizado"]"#.to_string(),
                default_state: Some("novo".to_string()),
                labels: None,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
            config,
            reason: "instance_default",
        }
    }

    fn vendor() -> SenderIdentity {
        SenderIdentity {
            contact: Some(Contact {
                id: "c1".to_string(),
                tenant_id: "t1".to_string(),
                phone: "+5511999990000".to_string(),
                display_name: Some("Zé do Depósito".to_string()),
                role: "vendor".to_string(),
                api_token: None,
                active: true,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            }),
            role: Some(ContactRole::Vendor),
            is_group: false,
        }
    }

    fn text_msg(body: &str, external_id: &str) -> NormalizedMessage {
        NormalizedMessage {
            kind: MessageKind::Text,
            from: Some("+5511999990000".to_string()),
            text: Some(body.to_string()),
            external_id: Some(external_id.to_string()),
            ..Default::default()
        }
    }

    fn image_msg(external_id: &str) -> NormalizedMessage {
        NormalizedMessage {
            kind: MessageKind::Image,
            from: Some("+5511999990000".to_string()),
            media_url: Some("https://media.example.com/img.jpg".to_string()),
            external_id: Some(external_id.to_string()),
            ..Default::default()
        }
    }

    fn engine() -> CaseEngine {
        CaseEngine::new(20)
    }

    #[tokio::test]
    async fn first_text_opens_a_case_in_the_default_state() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let decision = decision(TenantJourneyConfig::default());

        let plan = engine()
            .plan(
                &db,
                &instance,
                &decision,
                &vendor(),
                &text_msg("novo pedido", "e-1"),
                Direction::Inbound,
                "corr-1",
                None,
            )
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert!(outcome.created_case);

        let case = cases::get_case(&db, outcome.case_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case.state, "novo");
        assert_eq!(case.opened_by, "+5511999990000");
        assert_eq!(case.assignee_role.as_deref(), Some("vendor"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn initial_state_hint_overrides_the_journey_default() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let config = TenantJourneyConfig::parse(
            r#"{"initial_states": {"image": "aguardando_local"}}"#,
        );
        let decision = decision(config);

        let plan = engine()
            .plan(
                &db,
                &instance,
                &decision,
                &vendor(),
                &image_msg("e-1"),
                Direction::Inbound,
                "corr-1",
                None,
            )
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();

        let case = cases::get_case(&db, outcome.case_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case.state, "aguardando_local");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_state_hint_falls_back_to_journey_default() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let config =
            TenantJourneyConfig::parse(r#"{"initial_states": {"text": "no_such_state"}}"#);
        let decision = decision(config);

        let plan = engine()
            .plan(
                &db,
                &instance,
                &decision,
                &vendor(),
                &text_msg("oi", "e-1"),
                Direction::Inbound,
                "corr-1",
                None,
            )
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();
        let case = cases::get_case(&db, outcome.case_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case.state, "novo");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn image_with_automation_creates_pendencies_and_jobs() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let config = TenantJourneyConfig::parse(
            r#"{"ocr_enabled": true, "default_pendencies": true}"#,
        );
        let decision = decision(config);

        let plan = engine()
            .plan(
                &db,
                &instance,
                &decision,
                &vendor(),
                &image_msg("e-1"),
                Direction::Inbound,
                "corr-1",
                None,
            )
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert_eq!(outcome.created_pendencies.len(), 2);

        let open = pendencies::open_pendencies(&db, outcome.case_id.as_deref().unwrap())
            .await
            .unwrap();
        let kinds: Vec<&str> = open.iter().map(|p| p.kind.as_str()).collect();
        assert!(kinds.contains(&PENDENCY_NEED_LOCATION));
        assert!(kinds.contains(&PENDENCY_NEED_MORE_PAGES));
        assert!(open.iter().all(|p| p.expires_at.is_some()));

        let job_kinds: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT kind FROM jobs ORDER BY kind")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .unwrap();
        assert_eq!(job_kinds, vec!["ocr_extract", "pendency_prompt"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn location_writes_metadata_and_transitions() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let config = TenantJourneyConfig::parse(
            r#"{"create_on": {"location": true}, "location_next_state": "em_separacao"}"#,
        );
        let decision = decision(config);

        let msg = NormalizedMessage {
            kind: MessageKind::Location,
            from: Some("+5511999990000".to_string()),
            location: Some(byfrost_core::GeoPoint {
                latitude: -23.55,
                longitude: -46.63,
            }),
            external_id: Some("e-loc".to_string()),
            ..Default::default()
        };
        let plan = engine()
            .plan(&db, &instance, &decision, &vendor(), &msg, Direction::Inbound, "corr-1", None)
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();

        let case = cases::get_case(&db, outcome.case_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case.state, "em_separacao");
        let meta: serde_json::Value =
            serde_json::from_str(case.metadata.as_deref().unwrap()).unwrap();
        assert_eq!(meta["delivery_location"]["longitude"], -46.63);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn text_answers_the_open_pendency_and_reuses_the_case() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let config = TenantJourneyConfig::parse(r#"{"default_pendencies": true}"#);
        let decision = decision(config);

        let plan = engine()
            .plan(
                &db,
                &instance,
                &decision,
                &vendor(),
                &image_msg("e-1"),
                Direction::Inbound,
                "corr-1",
                None,
            )
            .await
            .unwrap();
        let first = apply_inbound(&db, plan).await.unwrap();
        let case_id = first.case_id.clone().unwrap();

        let plan = engine()
            .plan(
                &db,
                &instance,
                &decision,
                &vendor(),
                &text_msg("Rua das Flores, 100", "e-2"),
                Direction::Inbound,
                "corr-2",
                None,
            )
            .await
            .unwrap();
        let second = apply_inbound(&db, plan).await.unwrap();
        assert!(!second.created_case);
        assert_eq!(second.case_id.as_deref(), Some(case_id.as_str()));
        assert!(second.answered_pendency.is_some());

        // Oldest first: need_location was created before need_more_pages.
        let open = pendencies::open_pendencies(&db, &case_id).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kind, PENDENCY_NEED_MORE_PAGES);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_kind_stores_the_message_unlinked() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        // Default config does not open cases for location messages.
        let decision = decision(TenantJourneyConfig::default());

        let msg = NormalizedMessage {
            kind: MessageKind::Location,
            from: Some("+5511999990000".to_string()),
            location: Some(byfrost_core::GeoPoint {
                latitude: -23.55,
                longitude: -46.63,
            }),
            external_id: Some("e-loc".to_string()),
            ..Default::default()
        };
        let plan = engine()
            .plan(&db, &instance, &decision, &vendor(), &msg, Direction::Inbound, "corr-1", None)
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert!(outcome.case_id.is_none());
        assert!(!outcome.created_case);

        let stored = messages::find_by_correlation(&db, "corr-1").await.unwrap().unwrap();
        assert!(stored.case_id.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn sender_with_no_endpoint_is_a_rule_error() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let decision = decision(TenantJourneyConfig::default());
        let anonymous = SenderIdentity {
            contact: None,
            role: None,
            is_group: false,
        };
        let msg = NormalizedMessage {
            kind: MessageKind::Text,
            text: Some("oi".to_string()),
            ..Default::default()
        };

        let err = engine()
            .plan(&db, &instance, &decision, &anonymous, &msg, Direction::Inbound, "corr-1", None)
            .await
            .unwrap_err();
        assert_eq!(err.rule_code(), Some("no_identifiable_sender"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outbound_links_best_effort_and_unlinked_is_normal() {
        let (db, _dir) = setup_db().await;
        let instance = test_instance();
        let decision = decision(TenantJourneyConfig::default());

        // No open case yet: unlinked, not an error.
        let msg = NormalizedMessage {
            kind: MessageKind::Text,
            to: Some("+5511999990000".to_string()),
            text: Some("seu pedido saiu".to_string()),
            ..Default::default()
        };
        let plan = engine()
            .plan(&db, &instance, &decision, &vendor(), &msg, Direction::Outbound, "out-1", None)
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert!(outcome.case_id.is_none());

        // Open a case for the recipient, then the next outbound links.
        let plan = engine()
            .plan(
                &db,
                &instance,
                &decision,
                &vendor(),
                &text_msg("novo pedido", "e-1"),
                Direction::Inbound,
                "corr-1",
                None,
            )
            .await
            .unwrap();
        let inbound = apply_inbound(&db, plan).await.unwrap();

        let msg = NormalizedMessage {
            kind: MessageKind::Text,
            to: Some("+5511999990000".to_string()),
            text: Some("pedido em separação".to_string()),
            ..Default::default()
        };
        let plan = engine()
            .plan(&db, &instance, &decision, &vendor(), &msg, Direction::Outbound, "out-2", None)
            .await
            .unwrap();
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert_eq!(outcome.case_id, inbound.case_id);

        let events = timeline::events_for_case(&db, inbound.case_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(events[0].0, "opened");

        db.close().await.unwrap();
    }
}
