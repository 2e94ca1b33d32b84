// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pendency reads and simple mutations.
//!
//! Pendency creation during ingestion and the presence resolve-and-promote
//! flow run inside the atomic transactions in `crate::ingest` and
//! `crate::queries::presence`.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, now_utc, Database};
use crate::models::Pendency;

pub(crate) fn row_to_pendency(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pendency> {
    Ok(Pendency {
        id: row.get(0)?,
        case_id: row.get(1)?,
        kind: row.get(2)?,
        required: row.get(3)?,
        status: row.get(4)?,
        assignee_role: row.get(5)?,
        question: row.get(6)?,
        answer: row.get(7)?,
        expires_at: row.get(8)?,
        created_at: row.get(9)?,
        answered_at: row.get(10)?,
    })
}

pub(crate) const PENDENCY_COLUMNS: &str = "id, case_id, kind, required, status, assignee_role, \
     question, answer, expires_at, created_at, answered_at";

/// All open pendencies for a case, oldest first.
pub async fn open_pendencies(db: &Database, case_id: &str) -> Result<Vec<Pendency>, ByfrostError> {
    let case_id = case_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PENDENCY_COLUMNS} FROM pendencies
                 WHERE case_id = ?1 AND status = 'open'
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![case_id], row_to_pendency)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Count of open required pendencies for a case.
///
/// Gates both leaving `PENDENTE_JUSTIFICATIVA` and the day-close operation.
pub async fn open_required_count(db: &Database, case_id: &str) -> Result<i64, ByfrostError> {
    let case_id = case_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM pendencies
                 WHERE case_id = ?1 AND status = 'open' AND required = 1",
                params![case_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Answer a pendency by id. No-op if it is not open.
pub async fn answer_pendency(
    db: &Database,
    pendency_id: &str,
    answer: &str,
) -> Result<bool, ByfrostError> {
    let pendency_id = pendency_id.to_string();
    let answer = answer.to_string();
    let now = now_utc();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE pendencies SET status = 'answered', answer = ?1, answered_at = ?2
                 WHERE id = ?3 AND status = 'open'",
                params![answer, now, pendency_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    async fn raw_insert_pendency(
        db: &Database,
        id: &str,
        kind: &str,
        required: bool,
        created_at: &str,
    ) {
        let id = id.to_string();
        let kind = kind.to_string();
        let created_at = created_at.to_string();
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO journeys (id, key, name, states)
                     VALUES ('j1', 'presence', 'Presence', '[\"AGUARDANDO_ENTRADA\"]')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO cases (id, tenant_id, journey_id, case_type, status, state,
                         channel, opened_by)
                     SELECT 'case-1', 't1', 'j1', 'attendance', 'open', 'EM_EXPEDIENTE',
                         'app', 'emp-1'
                     WHERE NOT EXISTS (SELECT 1 FROM cases WHERE id = 'case-1')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO pendencies (id, case_id, kind, required, created_at)
                     VALUES (?1, 'case-1', ?2, ?3, ?4)",
                    params![id, kind, required, created_at],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn open_pendencies_come_back_oldest_first() {
        let (db, _dir) = setup_db().await;
        raw_insert_pendency(&db, "p2", "late_arrival", true, "2026-01-01T00:00:02.000Z").await;
        raw_insert_pendency(&db, "p1", "outside_radius", true, "2026-01-01T00:00:01.000Z").await;

        let open = open_pendencies(&db, "case-1").await.unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].id, "p1");
        assert_eq!(open[1].id, "p2");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn answering_clears_required_count() {
        let (db, _dir) = setup_db().await;
        raw_insert_pendency(&db, "p1", "late_arrival", true, "2026-01-01T00:00:01.000Z").await;
        raw_insert_pendency(&db, "p2", "need_location", false, "2026-01-01T00:00:02.000Z").await;

        assert_eq!(open_required_count(&db, "case-1").await.unwrap(), 1);

        assert!(answer_pendency(&db, "p1", "traffic jam").await.unwrap());
        assert_eq!(open_required_count(&db, "case-1").await.unwrap(), 0);

        // Second answer attempt is a no-op.
        assert!(!answer_pendency(&db, "p1", "again").await.unwrap());

        db.close().await.unwrap();
    }
}
