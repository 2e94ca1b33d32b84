// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic presence-clock transactions: punch recording, pendency resolution
//! with approval promotion, and the human-gated day-close.
//!
//! The presence engine evaluates policy (geofence, lateness) as pure
//! functions and hands this module the resulting specs; everything that
//! depends on stored state -- punch sequencing, the missing-break scan,
//! required-pendency gating, ledger balances -- is decided inside the
//! transaction so concurrent submissions converge.

use std::str::FromStr;

use byfrost_core::{ByfrostError, PresenceState, PunchKind};
use rusqlite::{params, Transaction};

use crate::database::{map_tr_err, now_utc, Database};
use crate::ingest::{append_timeline, create_pendency_if_absent, ensure_case, CaseSpec, PendencySpec};
use crate::models::TimePunch;

/// The `pendencies.kind` value gating final human approval.
pub const APPROVAL_PENDENCY_KIND: &str = "approval_required";

/// Everything one punch submission carries into the transaction.
///
/// `late_pendency` applies only when the resolved kind is ENTRY;
/// `outside_pendency` whenever the geofence evaluation flagged the punch;
/// `missing_break_pendency` only at EXIT when the day has no complete
/// BREAK_START/BREAK_END pair.
#[derive(Debug, Clone)]
pub struct PunchPlan {
    pub case: CaseSpec,
    pub punch_id: String,
    pub employee_id: String,
    pub forced_kind: Option<PunchKind>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub distance_m: Option<f64>,
    pub within_radius: Option<bool>,
    pub source: String,
    pub late_pendency: Option<PendencySpec>,
    pub outside_pendency: Option<PendencySpec>,
    pub missing_break_pendency: Option<PendencySpec>,
}

/// A recorded punch.
#[derive(Debug, Clone)]
pub struct PunchOutcome {
    pub case_id: String,
    pub created_case: bool,
    pub kind: PunchKind,
    pub state: String,
    pub distance_m: Option<f64>,
    pub within_radius: Option<bool>,
    /// A rule-violation pendency was created by this punch.
    pub flagged: bool,
}

/// Result of a punch submission. Submissions are never blocked; the only
/// rejection is a punch past EXIT without an explicit forced kind.
#[derive(Debug, Clone)]
pub enum PunchResult {
    Recorded(PunchOutcome),
    Rejected { case_id: String, reason: String },
}

/// Record a punch in one atomic transaction.
pub async fn record_punch(db: &Database, plan: PunchPlan) -> Result<PunchResult, ByfrostError> {
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let result = record_punch_in_tx(&tx, &plan, &now)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

fn record_punch_in_tx(
    tx: &Transaction<'_>,
    plan: &PunchPlan,
    now: &str,
) -> Result<PunchResult, rusqlite::Error> {
    let (case_id, created_case) = ensure_case(tx, &plan.case, now)?;

    // Sequence is inferred from the last recorded punch type.
    let last_kind: Option<String> = match tx.query_row(
        "SELECT kind FROM time_punches WHERE case_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
        params![case_id],
        |row| row.get(0),
    ) {
        Ok(kind) => Some(kind),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e),
    };

    let kind = match plan.forced_kind {
        Some(forced) => forced,
        None => {
            let next = match last_kind.as_deref() {
                None => Some(PunchKind::Entry),
                Some(last) => PunchKind::from_str(last).ok().and_then(PunchKind::next),
            };
            match next {
                Some(kind) => kind,
                None => {
                    return Ok(PunchResult::Rejected {
                        case_id,
                        reason: "already_exited".to_string(),
                    });
                }
            }
        }
    };

    tx.execute(
        "INSERT INTO time_punches (id, case_id, employee_id, kind, latitude, longitude,
             accuracy, distance_m, within_radius, source, forced, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            plan.punch_id,
            case_id,
            plan.employee_id,
            kind.to_string(),
            plan.latitude,
            plan.longitude,
            plan.accuracy,
            plan.distance_m,
            plan.within_radius,
            plan.source,
            plan.forced_kind.is_some(),
            now,
        ],
    )?;
    append_timeline(
        tx,
        &case_id,
        "punch",
        Some(serde_json::json!({
            "kind": kind.to_string(),
            "within_radius": plan.within_radius,
            "source": plan.source,
        })),
    )?;

    // Rule violations are recorded and flagged, never blocking.
    let mut flagged = false;
    if plan.within_radius == Some(false) {
        if let Some(ref spec) = plan.outside_pendency {
            flagged |= created_flagged(tx, &case_id, spec, now)?;
        }
    }
    if kind == PunchKind::Entry {
        if let Some(ref spec) = plan.late_pendency {
            flagged |= created_flagged(tx, &case_id, spec, now)?;
        }
    }
    if kind == PunchKind::Exit && !has_complete_break(tx, &case_id)? {
        if let Some(ref spec) = plan.missing_break_pendency {
            flagged |= created_flagged(tx, &case_id, spec, now)?;
        }
    }

    let state = next_presence_state(tx, &case_id, kind)?;
    tx.execute(
        "UPDATE cases SET state = ?1, updated_at = ?2 WHERE id = ?3",
        params![state, now, case_id],
    )?;

    Ok(PunchResult::Recorded(PunchOutcome {
        case_id,
        created_case,
        kind,
        state,
        distance_m: plan.distance_m,
        within_radius: plan.within_radius,
        flagged,
    }))
}

fn created_flagged(
    tx: &Transaction<'_>,
    case_id: &str,
    spec: &PendencySpec,
    now: &str,
) -> Result<bool, rusqlite::Error> {
    let created = create_pendency_if_absent(tx, case_id, spec, now)?;
    if created {
        append_timeline(
            tx,
            case_id,
            "pendency_created",
            Some(serde_json::json!({ "kind": spec.kind, "required": spec.required })),
        )?;
    }
    Ok(created)
}

/// True when the day's punches include a BREAK_START with a later BREAK_END.
fn has_complete_break(tx: &Transaction<'_>, case_id: &str) -> Result<bool, rusqlite::Error> {
    let mut stmt = tx.prepare(
        "SELECT kind, created_at FROM time_punches
         WHERE case_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![case_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut break_started = false;
    for row in rows {
        let (kind, _ts) = row?;
        match kind.as_str() {
            "BREAK_START" => break_started = true,
            "BREAK_END" if break_started => return Ok(true),
            _ => {}
        }
    }
    Ok(false)
}

/// The case state after a punch, honoring open required pendencies.
///
/// A case never leaves PENDENTE_JUSTIFICATIVA while a non-approval required
/// pendency is open, and never leaves PENDENTE_APROVACAO while approval is
/// outstanding.
fn next_presence_state(
    tx: &Transaction<'_>,
    case_id: &str,
    kind: PunchKind,
) -> Result<String, rusqlite::Error> {
    let open_required: i64 = tx.query_row(
        "SELECT COUNT(*) FROM pendencies
         WHERE case_id = ?1 AND status = 'open' AND required = 1 AND kind != ?2",
        params![case_id, APPROVAL_PENDENCY_KIND],
        |row| row.get(0),
    )?;
    if open_required > 0 {
        return Ok(PresenceState::PendenteJustificativa.to_string());
    }
    let approval_open: i64 = tx.query_row(
        "SELECT COUNT(*) FROM pendencies
         WHERE case_id = ?1 AND status = 'open' AND kind = ?2",
        params![case_id, APPROVAL_PENDENCY_KIND],
        |row| row.get(0),
    )?;
    if approval_open > 0 {
        return Ok(PresenceState::PendenteAprovacao.to_string());
    }
    let state = match kind {
        PunchKind::Entry | PunchKind::BreakEnd => PresenceState::EmExpediente,
        PunchKind::BreakStart => PresenceState::EmIntervalo,
        PunchKind::Exit => PresenceState::AguardandoSaida,
    };
    Ok(state.to_string())
}

/// Outcome of answering a presence pendency.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub answered: bool,
    pub state: String,
    /// The mandatory approval pendency was created by this resolution.
    pub approval_created: bool,
}

/// Answer a required presence pendency and promote the case when the last
/// non-approval requirement clears.
///
/// Resolving every required pendency automatically creates the mandatory
/// `approval_required` pendency and moves the case to PENDENTE_APROVACAO;
/// human approval (answering that pendency) is the final gate before close.
pub async fn resolve_presence_pendency(
    db: &Database,
    case_id: &str,
    pendency_id: &str,
    answer: &str,
    approval_pendency_id: &str,
) -> Result<ResolveOutcome, ByfrostError> {
    let case_id = case_id.to_string();
    let pendency_id = pendency_id.to_string();
    let answer = answer.to_string();
    let approval_pendency_id = approval_pendency_id.to_string();
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE pendencies SET status = 'answered', answer = ?1, answered_at = ?2
                 WHERE id = ?3 AND case_id = ?4 AND status = 'open'",
                params![answer, now, pendency_id, case_id],
            )?;
            if changed == 0 {
                let state: String = match tx.query_row(
                    "SELECT state FROM cases WHERE id = ?1",
                    params![case_id],
                    |row| row.get(0),
                ) {
                    Ok(state) => state,
                    Err(rusqlite::Error::QueryReturnedNoRows) => String::new(),
                    Err(e) => return Err(e.into()),
                };
                tx.commit()?;
                return Ok(ResolveOutcome {
                    answered: false,
                    state,
                    approval_created: false,
                });
            }
            append_timeline(
                &tx,
                &case_id,
                "pendency_answered",
                Some(serde_json::json!({ "pendency_id": pendency_id })),
            )?;

            let open_required: i64 = tx.query_row(
                "SELECT COUNT(*) FROM pendencies
                 WHERE case_id = ?1 AND status = 'open' AND required = 1 AND kind != ?2",
                params![case_id, APPROVAL_PENDENCY_KIND],
                |row| row.get(0),
            )?;

            let mut approval_created = false;
            let state = if open_required > 0 {
                PresenceState::PendenteJustificativa.to_string()
            } else {
                // All justifications cleared. Gate on human approval.
                let approval_exists: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM pendencies WHERE case_id = ?1 AND kind = ?2",
                    params![case_id, APPROVAL_PENDENCY_KIND],
                    |row| row.get(0),
                )?;
                if approval_exists == 0 {
                    let spec = PendencySpec {
                        id: approval_pendency_id.clone(),
                        kind: APPROVAL_PENDENCY_KIND.to_string(),
                        required: true,
                        assignee_role: Some("admin".to_string()),
                        question: None,
                        expires_at: None,
                    };
                    approval_created = create_pendency_if_absent(&tx, &case_id, &spec, &now)?;
                    if approval_created {
                        append_timeline(
                            &tx,
                            &case_id,
                            "pendency_created",
                            Some(serde_json::json!({ "kind": APPROVAL_PENDENCY_KIND })),
                        )?;
                    }
                }
                PresenceState::PendenteAprovacao.to_string()
            };

            tx.execute(
                "UPDATE cases SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![state, now, case_id],
            )?;
            tx.commit()?;
            Ok(ResolveOutcome {
                answered: true,
                state,
                approval_created,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome of the day-close operation.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub closed: bool,
    /// Set when the close is blocked; the case state is unchanged.
    pub blocked_reason: Option<String>,
    pub minutes_delta: Option<i64>,
    pub balance_after: Option<i64>,
}

/// Close a presence day: compute the minutes-delta against the planned
/// schedule and append one immutable ledger row.
///
/// Explicitly human-triggered, never automatic. Blocked -- not skipped --
/// while required pendencies remain open or the day has no EXIT punch.
pub async fn close_day(
    db: &Database,
    case_id: &str,
    planned_minutes: i64,
    note: Option<String>,
) -> Result<CloseOutcome, ByfrostError> {
    let case_id = case_id.to_string();
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let (tenant_id, employee_id, status): (String, String, String) = match tx.query_row(
                "SELECT tenant_id, opened_by, status FROM cases WHERE id = ?1 AND deleted = 0",
                params![case_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            ) {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    return Ok(CloseOutcome {
                        closed: false,
                        blocked_reason: Some("unknown_case".to_string()),
                        minutes_delta: None,
                        balance_after: None,
                    });
                }
                Err(e) => return Err(e.into()),
            };
            if status != "open" {
                tx.commit()?;
                return Ok(CloseOutcome {
                    closed: false,
                    blocked_reason: Some("already_closed".to_string()),
                    minutes_delta: None,
                    balance_after: None,
                });
            }

            let open_required: i64 = tx.query_row(
                "SELECT COUNT(*) FROM pendencies
                 WHERE case_id = ?1 AND status = 'open' AND required = 1",
                params![case_id],
                |row| row.get(0),
            )?;
            if open_required > 0 {
                tx.commit()?;
                return Ok(CloseOutcome {
                    closed: false,
                    blocked_reason: Some("pending_justification".to_string()),
                    minutes_delta: None,
                    balance_after: None,
                });
            }

            let worked = match worked_minutes(&tx, &case_id)? {
                Some(minutes) => minutes,
                None => {
                    tx.commit()?;
                    return Ok(CloseOutcome {
                        closed: false,
                        blocked_reason: Some("incomplete_day".to_string()),
                        minutes_delta: None,
                        balance_after: None,
                    });
                }
            };
            let delta = worked - planned_minutes;

            let previous: i64 = match tx.query_row(
                "SELECT balance_after FROM hour_ledger
                 WHERE tenant_id = ?1 AND employee_id = ?2
                 ORDER BY id DESC LIMIT 1",
                params![tenant_id, employee_id],
                |row| row.get(0),
            ) {
                Ok(balance) => balance,
                Err(rusqlite::Error::QueryReturnedNoRows) => 0,
                Err(e) => return Err(e.into()),
            };
            let balance_after = previous + delta;

            tx.execute(
                "INSERT INTO hour_ledger (tenant_id, employee_id, case_id, minutes_delta,
                     balance_after, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![tenant_id, employee_id, case_id, delta, balance_after, note, now],
            )?;
            tx.execute(
                "UPDATE cases SET state = ?1, status = 'closed', updated_at = ?2 WHERE id = ?3",
                params![PresenceState::Fechado.to_string(), now, case_id],
            )?;
            append_timeline(
                &tx,
                &case_id,
                "closed",
                Some(serde_json::json!({
                    "minutes_delta": delta,
                    "balance_after": balance_after,
                })),
            )?;

            tx.commit()?;
            Ok(CloseOutcome {
                closed: true,
                blocked_reason: None,
                minutes_delta: Some(delta),
                balance_after: Some(balance_after),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Worked minutes for the day: ENTRY to EXIT minus the first complete break
/// pair. `None` when the day lacks an ENTRY or EXIT punch.
fn worked_minutes(tx: &Transaction<'_>, case_id: &str) -> Result<Option<i64>, rusqlite::Error> {
    let mut stmt = tx.prepare(
        "SELECT kind, created_at FROM time_punches
         WHERE case_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![case_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entry = None;
    let mut exit = None;
    let mut break_start = None;
    let mut break_minutes = 0i64;
    for row in rows {
        let (kind, ts) = row?;
        let Some(instant) = parse_stored_ts(&ts) else {
            continue;
        };
        match kind.as_str() {
            "ENTRY" => entry = entry.or(Some(instant)),
            "EXIT" => exit = Some(instant),
            "BREAK_START" => break_start = Some(instant),
            "BREAK_END" => {
                if let Some(start) = break_start.take() {
                    break_minutes += (instant - start).num_minutes();
                }
            }
            _ => {}
        }
    }

    match (entry, exit) {
        (Some(entry), Some(exit)) => {
            let gross = (exit - entry).num_minutes();
            Ok(Some(gross - break_minutes))
        }
        _ => Ok(None),
    }
}

fn parse_stored_ts(ts: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc))
}

fn row_to_punch(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimePunch> {
    Ok(TimePunch {
        id: row.get(0)?,
        case_id: row.get(1)?,
        employee_id: row.get(2)?,
        kind: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        accuracy: row.get(6)?,
        distance_m: row.get(7)?,
        within_radius: row.get(8)?,
        source: row.get(9)?,
        forced: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// All punches for a case in chronological order.
pub async fn punches_for_case(db: &Database, case_id: &str) -> Result<Vec<TimePunch>, ByfrostError> {
    let case_id = case_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, case_id, employee_id, kind, latitude, longitude, accuracy,
                        distance_m, within_radius, source, forced, created_at
                 FROM time_punches WHERE case_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![case_id], row_to_punch)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Administrative punch correction: records the adjustment and rewrites the
/// punch kind in the same transaction. The only path that edits a punch.
pub async fn adjust_punch(
    db: &Database,
    adjustment_id: &str,
    punch_id: &str,
    admin_id: &str,
    new_kind: PunchKind,
    reason: &str,
) -> Result<(), ByfrostError> {
    let adjustment_id = adjustment_id.to_string();
    let punch_id = punch_id.to_string();
    let admin_id = admin_id.to_string();
    let reason = reason.to_string();
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let old_kind: String = tx.query_row(
                "SELECT kind FROM time_punches WHERE id = ?1",
                params![punch_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO punch_adjustments (id, punch_id, admin_id, reason, old_kind,
                     new_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    adjustment_id,
                    punch_id,
                    admin_id,
                    reason,
                    old_kind,
                    new_kind.to_string(),
                    now,
                ],
            )?;
            tx.execute(
                "UPDATE time_punches SET kind = ?1 WHERE id = ?2",
                params![new_kind.to_string(), punch_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Current bank-hour balance for an employee (0 when no ledger rows exist).
pub async fn current_balance(
    db: &Database,
    tenant_id: &str,
    employee_id: &str,
) -> Result<i64, ByfrostError> {
    let tenant_id = tenant_id.to_string();
    let employee_id = employee_id.to_string();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT balance_after FROM hour_ledger
                 WHERE tenant_id = ?1 AND employee_id = ?2
                 ORDER BY id DESC LIMIT 1",
                params![tenant_id, employee_id],
                |row| row.get(0),
            ) {
                Ok(balance) => Ok(balance),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}
