// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message reads. Inserts happen inside the atomic ingest transaction.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::MessageRecord;

pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        case_id: row.get(1)?,
        instance_id: row.get(2)?,
        direction: row.get(3)?,
        kind: row.get(4)?,
        from_phone: row.get(5)?,
        to_phone: row.get(6)?,
        body: row.get(7)?,
        media_url: row.get(8)?,
        external_id: row.get(9)?,
        correlation_id: row.get(10)?,
        raw_payload: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub(crate) const MESSAGE_COLUMNS: &str = "id, case_id, instance_id, direction, kind, from_phone, \
     to_phone, body, media_url, external_id, correlation_id, raw_payload, created_at";

/// Find a message by its correlation id (the dedup key).
pub async fn find_by_correlation(
    db: &Database,
    correlation_id: &str,
) -> Result<Option<MessageRecord>, ByfrostError> {
    let correlation_id = correlation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE correlation_id = ?1"
            ))?;
            match stmt.query_row(params![correlation_id], row_to_message) {
                Ok(msg) => Ok(Some(msg)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Messages for a case in chronological order.
pub async fn messages_for_case(
    db: &Database,
    case_id: &str,
    limit: Option<i64>,
) -> Result<Vec<MessageRecord>, ByfrostError> {
    let case_id = case_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            let sql = match limit {
                Some(_) => format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE case_id = ?1 ORDER BY created_at ASC LIMIT ?2"
                ),
                None => format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE case_id = ?1 ORDER BY created_at ASC"
                ),
            };
            let mut stmt = conn.prepare(&sql)?;
            match limit {
                Some(lim) => {
                    let rows = stmt.query_map(params![case_id, lim], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let rows = stmt.query_map(params![case_id], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}
