// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Case reads and administrative case mutations.
//!
//! Case creation during message ingestion happens inside the atomic
//! transactions in `crate::ingest` and `crate::queries::presence`, never here.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, now_utc, Database};
use crate::models::Case;

pub(crate) fn row_to_case(row: &rusqlite::Row<'_>) -> rusqlite::Result<Case> {
    Ok(Case {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        journey_id: row.get(2)?,
        case_type: row.get(3)?,
        status: row.get(4)?,
        state: row.get(5)?,
        channel: row.get(6)?,
        opened_by: row.get(7)?,
        assignee_role: row.get(8)?,
        metadata: row.get(9)?,
        case_date: row.get(10)?,
        deleted: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) const CASE_COLUMNS: &str = "id, tenant_id, journey_id, case_type, status, state, \
     channel, opened_by, assignee_role, metadata, case_date, deleted, created_at, updated_at";

/// Get a case by id.
pub async fn get_case(db: &Database, id: &str) -> Result<Option<Case>, ByfrostError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_case) {
                Ok(case) => Ok(Some(case)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent open, non-deleted conversational case for a sender within
/// a journey, if any.
pub async fn latest_open_case(
    db: &Database,
    tenant_id: &str,
    journey_id: &str,
    opened_by: &str,
) -> Result<Option<Case>, ByfrostError> {
    let tenant_id = tenant_id.to_string();
    let journey_id = journey_id.to_string();
    let opened_by = opened_by.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CASE_COLUMNS} FROM cases
                 WHERE tenant_id = ?1 AND journey_id = ?2 AND opened_by = ?3
                   AND case_date IS NULL AND status = 'open' AND deleted = 0
                 ORDER BY created_at DESC
                 LIMIT 1"
            ))?;
            match stmt.query_row(params![tenant_id, journey_id, opened_by], row_to_case) {
                Ok(case) => Ok(Some(case)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// The daily attendance case for (tenant, employee, day), if one exists.
pub async fn daily_case(
    db: &Database,
    tenant_id: &str,
    employee_id: &str,
    case_date: &str,
) -> Result<Option<Case>, ByfrostError> {
    let tenant_id = tenant_id.to_string();
    let employee_id = employee_id.to_string();
    let case_date = case_date.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CASE_COLUMNS} FROM cases
                 WHERE tenant_id = ?1 AND opened_by = ?2 AND case_date = ?3 AND deleted = 0"
            ))?;
            match stmt.query_row(params![tenant_id, employee_id, case_date], row_to_case) {
                Ok(case) => Ok(Some(case)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Administrative state override. The state value is validated against the
/// journey by the caller.
pub async fn update_case_state(db: &Database, id: &str, state: &str) -> Result<(), ByfrostError> {
    let id = id.to_string();
    let state = state.to_string();
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE cases SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![state, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete a case. Cases are never hard-deleted.
pub async fn soft_delete_case(db: &Database, id: &str) -> Result<(), ByfrostError> {
    let id = id.to_string();
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE cases SET deleted = 1, updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Journey;
    use crate::queries::journeys::insert_journey;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        insert_journey(
            &db,
            &Journey {
                id: "j1".to_string(),
                key: "vendor_orders".to_string(),
                name: "Vendor orders".to_string(),
                is_crm: false,
                states: r#"["novo","em_andamento","finalizado"]"#.to_string(),
                default_state: Some("novo".to_string()),
                labels: None,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    async fn raw_insert_case(db: &Database, id: &str, opened_by: &str, created_at: &str) {
        let id = id.to_string();
        let opened_by = opened_by.to_string();
        let created_at = created_at.to_string();
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO cases (id, tenant_id, journey_id, case_type, status, state,
                         channel, opened_by, created_at, updated_at)
                     VALUES (?1, 't1', 'j1', 'conversation', 'open', 'novo',
                         'whatsapp', ?2, ?3, ?3)",
                    params![id, opened_by, created_at],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn latest_open_case_prefers_newest() {
        let (db, _dir) = setup_db().await;
        raw_insert_case(&db, "c-old", "+5511999990000", "2026-01-01T00:00:00.000Z").await;
        // The partial unique index allows a second row only once the first is
        // closed; close it first, as a real flow would.
        update_case_status_for_test(&db, "c-old", "closed").await;
        raw_insert_case(&db, "c-new", "+5511999990000", "2026-02-01T00:00:00.000Z").await;

        let latest = latest_open_case(&db, "t1", "j1", "+5511999990000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, "c-new");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn soft_deleted_cases_are_invisible() {
        let (db, _dir) = setup_db().await;
        raw_insert_case(&db, "c1", "+5511999990000", "2026-01-01T00:00:00.000Z").await;
        soft_delete_case(&db, "c1").await.unwrap();

        let latest = latest_open_case(&db, "t1", "j1", "+5511999990000").await.unwrap();
        assert!(latest.is_none());

        // The row itself still exists.
        let case = get_case(&db, "c1").await.unwrap().unwrap();
        assert!(case.deleted);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn state_override_touches_updated_at() {
        let (db, _dir) = setup_db().await;
        raw_insert_case(&db, "c1", "+5511999990000", "2026-01-01T00:00:00.000Z").await;

        update_case_state(&db, "c1", "em_andamento").await.unwrap();
        let case = get_case(&db, "c1").await.unwrap().unwrap();
        assert_eq!(case.state, "em_andamento");
        assert!(case.updated_at > case.created_at);

        db.close().await.unwrap();
    }

    async fn update_case_status_for_test(db: &Database, id: &str, status: &str) {
        let id = id.to_string();
        let status = status.to_string();
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE cases SET status = ?1 WHERE id = ?2",
                    params![status, id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }
}
