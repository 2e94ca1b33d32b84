// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The atomic inbound-application transaction.
//!
//! The journey engine computes an [`InboundPlan`] (a pure decision), and
//! `apply_inbound` executes the whole of it -- ensure case, write message,
//! create/answer pendencies, enqueue follow-up jobs, log timeline events --
//! in one transaction on the single writer thread. Partial application
//! (case created but message write failed, or vice versa) cannot happen.
//!
//! Races on case creation are resolved by the partial unique indexes on
//! `cases`: attempt the insert, and on a unique violation re-select the row
//! that won.

use byfrost_core::ByfrostError;
use rusqlite::{params, Transaction};

use crate::database::{is_unique_violation, map_tr_err, now_utc, Database};

/// Case creation parameters, used only when no open case can be reused.
#[derive(Debug, Clone)]
pub struct CaseSpec {
    /// Candidate id; discarded when an insert race loses.
    pub id: String,
    pub tenant_id: String,
    pub journey_id: String,
    pub case_type: String,
    pub initial_state: String,
    pub channel: String,
    pub opened_by: String,
    pub assignee_role: Option<String>,
    pub metadata: Option<String>,
    /// `YYYY-MM-DD` for day-scoped cases, else `None`.
    pub case_date: Option<String>,
}

/// How the plan binds the message to a case.
#[derive(Debug, Clone)]
pub enum CaseDisposition {
    /// Reuse a known open case.
    Reuse(String),
    /// Create (or converge on) a case from the spec.
    Create(CaseSpec),
    /// No case: the message is stored unlinked. A normal outcome for
    /// outbound capture and for kinds the tenant does not open cases for.
    Unlinked,
}

/// The message row to write.
#[derive(Debug, Clone)]
pub struct MessageSpec {
    pub id: String,
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
}

/// A pendency to create unless an open one of the same kind already exists.
#[derive(Debug, Clone)]
pub struct PendencySpec {
    pub id: String,
    pub kind: String,
    pub required: bool,
    pub assignee_role: Option<String>,
    pub question: Option<String>,
    pub expires_at: Option<String>,
}

/// Answer the oldest open pendency assigned to the sending role.
#[derive(Debug, Clone)]
pub struct AnswerSpec {
    pub role: Option<String>,
    pub answer: String,
}

/// A background job to enqueue, keyed for idempotency.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub kind: String,
    pub idempotency_key: String,
    pub payload: String,
}

/// Everything one inbound (or captured outbound) event does to the store.
#[derive(Debug, Clone)]
pub struct InboundPlan {
    pub case: CaseDisposition,
    pub message: MessageSpec,
    /// Transition the case to this state after applying the message.
    pub set_state: Option<String>,
    /// JSON object merged into the case metadata (location writes).
    pub merge_metadata: Option<serde_json::Value>,
    pub pendencies: Vec<PendencySpec>,
    pub answer: Option<AnswerSpec>,
    pub jobs: Vec<JobSpec>,
    /// For outbound capture: suppress a near-duplicate (same recipient, same
    /// kind, same body) within this many seconds. `None` disables.
    pub outbound_dedup_window_secs: Option<i64>,
}

/// What the transaction did.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub case_id: Option<String>,
    pub created_case: bool,
    /// The event was a redelivery or a near-duplicate; nothing was written.
    pub duplicate: bool,
    pub answered_pendency: Option<String>,
    pub created_pendencies: Vec<String>,
}

/// Apply an inbound plan in one atomic transaction.
pub async fn apply_inbound(db: &Database, plan: InboundPlan) -> Result<ApplyOutcome, ByfrostError> {
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let outcome = apply_in_tx(&tx, &plan, &now)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

fn apply_in_tx(
    tx: &Transaction<'_>,
    plan: &InboundPlan,
    now: &str,
) -> Result<ApplyOutcome, rusqlite::Error> {
    // Redelivery: the correlation id has been seen before.
    let seen = tx
        .query_row(
            "SELECT 1 FROM messages WHERE correlation_id = ?1",
            params![plan.message.correlation_id],
            |_| Ok(()),
        )
        .map(Some)
        .or_else(no_rows_to_none)?
        .is_some();
    if seen {
        return Ok(ApplyOutcome {
            duplicate: true,
            ..Default::default()
        });
    }

    // Outbound retry storms: same recipient, kind, and body inside the window.
    if plan.message.direction == "outbound" {
        if let Some(window) = plan.outbound_dedup_window_secs {
            let cutoff = cutoff_before(now, window);
            let near_dup = tx
                .query_row(
                    "SELECT 1 FROM messages
                     WHERE direction = 'outbound'
                       AND to_phone IS ?1 AND kind = ?2 AND IFNULL(body, '') = ?3
                       AND created_at >= ?4
                     LIMIT 1",
                    params![
                        plan.message.to_phone,
                        plan.message.kind,
                        plan.message.body.clone().unwrap_or_default(),
                        cutoff,
                    ],
                    |_| Ok(()),
                )
                .map(Some)
                .or_else(no_rows_to_none)?
                .is_some();
            if near_dup {
                return Ok(ApplyOutcome {
                    duplicate: true,
                    ..Default::default()
                });
            }
        }
    }

    let mut outcome = ApplyOutcome::default();

    // Ensure the case.
    let case_id = match &plan.case {
        CaseDisposition::Reuse(id) => Some(id.clone()),
        CaseDisposition::Create(spec) => {
            let (id, created) = ensure_case(tx, spec, now)?;
            if created {
                append_timeline(
                    tx,
                    &id,
                    "opened",
                    Some(serde_json::json!({
                        "journey_id": spec.journey_id,
                        "state": spec.initial_state,
                        "channel": spec.channel,
                    })),
                )?;
            }
            outcome.created_case = created;
            Some(id)
        }
        CaseDisposition::Unlinked => None,
    };

    // Write the message.
    tx.execute(
        "INSERT INTO messages (id, case_id, instance_id, direction, kind, from_phone,
             to_phone, body, media_url, external_id, correlation_id, raw_payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            plan.message.id,
            case_id,
            plan.message.instance_id,
            plan.message.direction,
            plan.message.kind,
            plan.message.from_phone,
            plan.message.to_phone,
            plan.message.body,
            plan.message.media_url,
            plan.message.external_id,
            plan.message.correlation_id,
            plan.message.raw_payload,
            now,
        ],
    )?;

    if let Some(ref case_id) = case_id {
        if let Some(ref metadata) = plan.merge_metadata {
            merge_case_metadata(tx, case_id, metadata, now)?;
        }

        if let Some(ref state) = plan.set_state {
            let from: String = tx.query_row(
                "SELECT state FROM cases WHERE id = ?1",
                params![case_id],
                |row| row.get(0),
            )?;
            if from != *state {
                tx.execute(
                    "UPDATE cases SET state = ?1, updated_at = ?2 WHERE id = ?3",
                    params![state, now, case_id],
                )?;
                append_timeline(
                    tx,
                    case_id,
                    "transition",
                    Some(serde_json::json!({ "from": from, "to": state })),
                )?;
            }
        }

        for spec in &plan.pendencies {
            if create_pendency_if_absent(tx, case_id, spec, now)? {
                outcome.created_pendencies.push(spec.kind.clone());
                append_timeline(
                    tx,
                    case_id,
                    "pendency_created",
                    Some(serde_json::json!({ "kind": spec.kind, "required": spec.required })),
                )?;
            }
        }

        if let Some(ref answer) = plan.answer {
            if let Some(pendency_id) = answer_oldest_open(tx, case_id, answer, now)? {
                append_timeline(
                    tx,
                    case_id,
                    "pendency_answered",
                    Some(serde_json::json!({ "pendency_id": pendency_id })),
                )?;
                outcome.answered_pendency = Some(pendency_id);
            }
        }
    }

    for job in &plan.jobs {
        tx.execute(
            "INSERT OR IGNORE INTO jobs (kind, case_id, idempotency_key, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![job.kind, case_id, job.idempotency_key, job.payload],
        )?;
    }

    outcome.case_id = case_id;
    Ok(outcome)
}

/// Insert the case, or converge on the row that won the race.
///
/// Returns `(case_id, created)`.
pub(crate) fn ensure_case(
    tx: &Transaction<'_>,
    spec: &CaseSpec,
    now: &str,
) -> Result<(String, bool), rusqlite::Error> {
    let inserted = tx.execute(
        "INSERT INTO cases (id, tenant_id, journey_id, case_type, status, state, channel,
             opened_by, assignee_role, metadata, case_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'open', ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            spec.id,
            spec.tenant_id,
            spec.journey_id,
            spec.case_type,
            spec.initial_state,
            spec.channel,
            spec.opened_by,
            spec.assignee_role,
            spec.metadata,
            spec.case_date,
            now,
        ],
    );

    match inserted {
        Ok(_) => Ok((spec.id.clone(), true)),
        Err(e) if is_unique_violation(&e) => {
            // Another event created the case first; adopt it.
            let id: String = match &spec.case_date {
                Some(date) => tx.query_row(
                    "SELECT id FROM cases
                     WHERE tenant_id = ?1 AND opened_by = ?2 AND case_date = ?3 AND deleted = 0",
                    params![spec.tenant_id, spec.opened_by, date],
                    |row| row.get(0),
                )?,
                None => tx.query_row(
                    "SELECT id FROM cases
                     WHERE tenant_id = ?1 AND journey_id = ?2 AND opened_by = ?3
                       AND case_date IS NULL AND status = 'open' AND deleted = 0",
                    params![spec.tenant_id, spec.journey_id, spec.opened_by],
                    |row| row.get(0),
                )?,
            };
            Ok((id, false))
        }
        Err(e) => Err(e),
    }
}

fn merge_case_metadata(
    tx: &Transaction<'_>,
    case_id: &str,
    patch: &serde_json::Value,
    now: &str,
) -> Result<(), rusqlite::Error> {
    let current: Option<String> = tx.query_row(
        "SELECT metadata FROM cases WHERE id = ?1",
        params![case_id],
        |row| row.get(0),
    )?;
    let mut merged = current
        .as_deref()
        .and_then(|m| serde_json::from_str::<serde_json::Value>(m).ok())
        .unwrap_or_else(|| serde_json::json!({}));
    if let (Some(obj), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
        for (k, v) in patch_obj {
            obj.insert(k.clone(), v.clone());
        }
    }
    tx.execute(
        "UPDATE cases SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
        params![merged.to_string(), now, case_id],
    )?;
    Ok(())
}

/// Insert a pendency unless an open one of the same kind exists for the case.
pub(crate) fn create_pendency_if_absent(
    tx: &Transaction<'_>,
    case_id: &str,
    spec: &PendencySpec,
    now: &str,
) -> Result<bool, rusqlite::Error> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM pendencies
             WHERE case_id = ?1 AND kind = ?2 AND status = 'open'
             LIMIT 1",
            params![case_id, spec.kind],
            |_| Ok(()),
        )
        .map(Some)
        .or_else(no_rows_to_none)?
        .is_some();
    if exists {
        return Ok(false);
    }
    tx.execute(
        "INSERT INTO pendencies (id, case_id, kind, required, assignee_role, question,
             expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            spec.id,
            case_id,
            spec.kind,
            spec.required,
            spec.assignee_role,
            spec.question,
            spec.expires_at,
            now,
        ],
    )?;
    Ok(true)
}

fn answer_oldest_open(
    tx: &Transaction<'_>,
    case_id: &str,
    answer: &AnswerSpec,
    now: &str,
) -> Result<Option<String>, rusqlite::Error> {
    let found: Option<String> = match &answer.role {
        Some(role) => tx
            .query_row(
                "SELECT id FROM pendencies
                 WHERE case_id = ?1 AND status = 'open' AND assignee_role = ?2
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT 1",
                params![case_id, role],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(no_rows_to_none)?,
        None => tx
            .query_row(
                "SELECT id FROM pendencies
                 WHERE case_id = ?1 AND status = 'open'
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT 1",
                params![case_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(no_rows_to_none)?,
    };
    let Some(pendency_id) = found else {
        return Ok(None);
    };
    tx.execute(
        "UPDATE pendencies SET status = 'answered', answer = ?1, answered_at = ?2
         WHERE id = ?3",
        params![answer.answer, now, pendency_id],
    )?;
    Ok(Some(pendency_id))
}

pub(crate) fn append_timeline(
    tx: &Transaction<'_>,
    case_id: &str,
    event: &str,
    detail: Option<serde_json::Value>,
) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO case_timeline (case_id, event, detail) VALUES (?1, ?2, ?3)",
        params![case_id, event, detail.map(|d| d.to_string())],
    )?;
    Ok(())
}

fn no_rows_to_none<T>(e: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

/// Timestamp `secs` seconds before `now`, in the stored format.
fn cutoff_before(now: &str, secs: i64) -> String {
    chrono::DateTime::parse_from_rfc3339(now)
        .map(|t| {
            (t - chrono::Duration::seconds(secs))
                .with_timezone(&chrono::Utc)
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string()
        })
        .unwrap_or_else(|_| now.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Journey;
    use crate::queries::{journeys, messages, pendencies, timeline};
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
                states: r#"["novo","aguardando_local","em_andamento"]"#.to_string(),
                default_state: Some("novo".to_string()),
                labels: None,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    fn case_spec(id: &str) -> CaseSpec {
        CaseSpec {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            journey_id: "j1".to_string(),
            case_type: "conversation".to_string(),
            initial_state: "novo".to_string(),
            channel: "whatsapp".to_string(),
            opened_by: "+5511999990000".to_string(),
            assignee_role: Some("vendor".to_string()),
            metadata: None,
            case_date: None,
        }
    }

    fn message_spec(id: &str, correlation: &str) -> MessageSpec {
        MessageSpec {
            id: id.to_string(),
            instance_id: "i1".to_string(),
            direction: "inbound".to_string(),
            kind: "text".to_string(),
            from_phone: Some("+5511999990000".to_string()),
            to_phone: Some("+5511988880000".to_string()),
            body: Some("novo pedido".to_string()),
            media_url: None,
            external_id: Some(correlation.to_string()),
            correlation_id: correlation.to_string(),
            raw_payload: None,
        }
    }

    fn basic_plan(case: CaseDisposition, message: MessageSpec) -> InboundPlan {
        InboundPlan {
            case,
            message,
            set_state: None,
            merge_metadata: None,
            pendencies: Vec::new(),
            answer: None,
            jobs: Vec::new(),
            outbound_dedup_window_secs: None,
        }
    }

    #[tokio::test]
    async fn first_event_opens_case_and_writes_message() {
        let (db, _dir) = setup_db().await;

        let plan = basic_plan(
            CaseDisposition::Create(case_spec("c1")),
            message_spec("m1", "wamid-1"),
        );
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert!(outcome.created_case);
        assert!(!outcome.duplicate);
        assert_eq!(outcome.case_id.as_deref(), Some("c1"));

        let msg = messages::find_by_correlation(&db, "wamid-1").await.unwrap().unwrap();
        assert_eq!(msg.case_id.as_deref(), Some("c1"));

        let events = timeline::events_for_case(&db, "c1").await.unwrap();
        assert_eq!(events[0].0, "opened");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn redelivery_of_same_correlation_id_is_a_noop() {
        let (db, _dir) = setup_db().await;

        let plan = basic_plan(
            CaseDisposition::Create(case_spec("c1")),
            message_spec("m1", "wamid-1"),
        );
        apply_inbound(&db, plan).await.unwrap();

        // Same correlation id, fresh candidate ids: the provider retried.
        let plan = basic_plan(
            CaseDisposition::Create(case_spec("c2")),
            message_spec("m2", "wamid-1"),
        );
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert!(outcome.duplicate);
        assert!(outcome.case_id.is_none());

        // Exactly one message row, one case.
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn case_insert_race_converges_on_one_case() {
        let (db, _dir) = setup_db().await;

        let plan = basic_plan(
            CaseDisposition::Create(case_spec("c1")),
            message_spec("m1", "wamid-1"),
        );
        let first = apply_inbound(&db, plan).await.unwrap();
        assert!(first.created_case);

        // A second message from the same sender with a stale "no case exists"
        // read: the unique index redirects it to the surviving case.
        let plan = basic_plan(
            CaseDisposition::Create(case_spec("c-loser")),
            message_spec("m2", "wamid-2"),
        );
        let second = apply_inbound(&db, plan).await.unwrap();
        assert!(!second.created_case);
        assert_eq!(second.case_id.as_deref(), Some("c1"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn image_plan_creates_pendencies_and_jobs_idempotently() {
        let (db, _dir) = setup_db().await;

        let pendency_specs = vec![
            PendencySpec {
                id: "p-loc".to_string(),
                kind: "need_location".to_string(),
                required: false,
                assignee_role: Some("vendor".to_string()),
                question: Some("Qual o local de entrega?".to_string()),
                expires_at: Some("2026-01-02T00:00:00.000Z".to_string()),
            },
            PendencySpec {
                id: "p-pages".to_string(),
                kind: "need_more_pages".to_string(),
                required: false,
                assignee_role: Some("vendor".to_string()),
                question: None,
                expires_at: None,
            },
        ];
        let mut plan = basic_plan(
            CaseDisposition::Create(case_spec("c1")),
            message_spec("m1", "wamid-1"),
        );
        plan.message.kind = "image".to_string();
        plan.pendencies = pendency_specs.clone();
        plan.jobs = vec![JobSpec {
            kind: "ocr_extract".to_string(),
            idempotency_key: "ocr:c1:m1".to_string(),
            payload: "{}".to_string(),
        }];
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert_eq!(outcome.created_pendencies.len(), 2);

        // Second image while the pendencies are still open: no duplicates.
        let mut plan = basic_plan(
            CaseDisposition::Reuse("c1".to_string()),
            message_spec("m2", "wamid-2"),
        );
        plan.message.kind = "image".to_string();
        plan.pendencies = pendency_specs
            .into_iter()
            .map(|mut p| {
                p.id = format!("{}-retry", p.id);
                p
            })
            .collect();
        plan.jobs = vec![JobSpec {
            kind: "ocr_extract".to_string(),
            idempotency_key: "ocr:c1:m1".to_string(), // same bucket
            payload: "{}".to_string(),
        }];
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert!(outcome.created_pendencies.is_empty());

        let open = pendencies::open_pendencies(&db, "c1").await.unwrap();
        assert_eq!(open.len(), 2);

        let job_count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))
            })
            .await
            .unwrap();
        assert_eq!(job_count, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn text_answers_oldest_open_pendency_for_role() {
        let (db, _dir) = setup_db().await;

        let mut plan = basic_plan(
            CaseDisposition::Create(case_spec("c1")),
            message_spec("m1", "wamid-1"),
        );
        plan.pendencies = vec![PendencySpec {
            id: "p1".to_string(),
            kind: "need_location".to_string(),
            required: false,
            assignee_role: Some("vendor".to_string()),
            question: None,
            expires_at: None,
        }];
        apply_inbound(&db, plan).await.unwrap();

        let mut plan = basic_plan(
            CaseDisposition::Reuse("c1".to_string()),
            message_spec("m2", "wamid-2"),
        );
        plan.answer = Some(AnswerSpec {
            role: Some("vendor".to_string()),
            answer: "Rua das Flores, 100".to_string(),
        });
        let outcome = apply_inbound(&db, plan).await.unwrap();
        assert_eq!(outcome.answered_pendency.as_deref(), Some("p1"));

        let open = pendencies::open_pendencies(&db, "c1").await.unwrap();
        assert!(open.is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn location_merges_metadata_and_transitions() {
        let (db, _dir) = setup_db().await;

        apply_inbound(
            &db,
            basic_plan(
                CaseDisposition::Create(case_spec("c1")),
                message_spec("m1", "wamid-1"),
            ),
        )
        .await
        .unwrap();

        let mut plan = basic_plan(
            CaseDisposition::Reuse("c1".to_string()),
            message_spec("m2", "wamid-2"),
        );
        plan.message.kind = "location".to_string();
        plan.merge_metadata = Some(serde_json::json!({
            "delivery_location": { "latitude": -23.55, "longitude": -46.63 }
        }));
        plan.set_state = Some("em_andamento".to_string());
        apply_inbound(&db, plan).await.unwrap();

        let case = crate::queries::cases::get_case(&db, "c1").await.unwrap().unwrap();
        assert_eq!(case.state, "em_andamento");
        let meta: serde_json::Value =
            serde_json::from_str(case.metadata.as_deref().unwrap()).unwrap();
        assert_eq!(meta["delivery_location"]["latitude"], -23.55);

        let events = timeline::events_for_case(&db, "c1").await.unwrap();
        assert!(events.iter().any(|(e, _)| e == "transition"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outbound_near_duplicate_within_window_is_suppressed() {
        let (db, _dir) = setup_db().await;

        let mut msg = message_spec("m1", "out-1");
        msg.direction = "outbound".to_string();
        let mut plan = basic_plan(CaseDisposition::Unlinked, msg);
        plan.outbound_dedup_window_secs = Some(20);
        let first = apply_inbound(&db, plan).await.unwrap();
        assert!(!first.duplicate);

        // Provider retry storm: same recipient, kind, body, new correlation.
        let mut msg = message_spec("m2", "out-2");
        msg.direction = "outbound".to_string();
        let mut plan = basic_plan(CaseDisposition::Unlinked, msg);
        plan.outbound_dedup_window_secs = Some(20);
        let second = apply_inbound(&db, plan).await.unwrap();
        assert!(second.duplicate);

        // A different body goes through.
        let mut msg = message_spec("m3", "out-3");
        msg.direction = "outbound".to_string();
        msg.body = Some("outro texto".to_string());
        let mut plan = basic_plan(CaseDisposition::Unlinked, msg);
        plan.outbound_dedup_window_secs = Some(20);
        let third = apply_inbound(&db, plan).await.unwrap();
        assert!(!third.duplicate);

        db.close().await.unwrap();
    }
}
