// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only case timeline.
//!
//! The timeline exists purely as an audit record. It is never queried for
//! control decisions.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Append one timeline event for a case.
pub async fn append(
    db: &Database,
    case_id: &str,
    event: &str,
    detail: Option<serde_json::Value>,
) -> Result<(), ByfrostError> {
    let case_id = case_id.to_string();
    let event = event.to_string();
    let detail = detail.map(|d| d.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO case_timeline (case_id, event, detail) VALUES (?1, ?2, ?3)",
                params![case_id, event, detail],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Events for a case in append order. Audit/diagnostic use only.
pub async fn events_for_case(
    db: &Database,
    case_id: &str,
) -> Result<Vec<(String, Option<String>)>, ByfrostError> {
    let case_id = case_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT event, detail FROM case_timeline WHERE case_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![case_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}
