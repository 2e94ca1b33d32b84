// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic inbox writes.
//!
//! One row per webhook invocation -- success, failure, duplicate,
//! unauthorized, ignored -- independent of whether business processing
//! succeeded. This is the primary observability surface for the ingestion
//! subsystem and is written on every path, including early exits.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::InboxRecord;

/// Persist one diagnostic inbox record. Returns the row id.
pub async fn record(db: &Database, entry: InboxRecord) -> Result<i64, ByfrostError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO inbox_log (instance_id, direction, kind, from_phone, to_phone,
                     correlation_id, outcome, reason, raw_payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.instance_id,
                    entry.direction,
                    entry.kind,
                    entry.from_phone,
                    entry.to_phone,
                    entry.correlation_id,
                    entry.outcome,
                    entry.reason,
                    entry.raw_payload,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome and reason of the most recent inbox rows, newest first.
/// Operational/diagnostic use only.
pub async fn recent_outcomes(
    db: &Database,
    limit: i64,
) -> Result<Vec<(String, Option<String>)>, ByfrostError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT outcome, reason FROM inbox_log ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn every_outcome_is_recordable() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        for outcome in ["processed", "duplicate", "ignored", "unauthorized", "error"] {
            let id = record(
                &db,
                InboxRecord {
                    outcome: outcome.to_string(),
                    reason: Some("test".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
            assert!(id > 0);
        }

        let outcomes = recent_outcomes(&db, 10).await.unwrap();
        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[0].0, "error"); // newest first

        db.close().await.unwrap();
    }
}
