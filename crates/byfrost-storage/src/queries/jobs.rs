// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable background job queue (OCR extraction, field validation, outbound
//! pendency prompts).
//!
//! Every job carries an idempotency key derived from (kind, case, timestamp
//! bucket) so webhook redelivery never double-enqueues meaningfully duplicate
//! work.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::Job;

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        kind: row.get(1)?,
        case_id: row.get(2)?,
        idempotency_key: row.get(3)?,
        payload: row.get(4)?,
        status: row.get(5)?,
        attempts: row.get(6)?,
        max_attempts: row.get(7)?,
        locked_until: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const JOB_COLUMNS: &str = "id, kind, case_id, idempotency_key, payload, status, attempts, \
     max_attempts, locked_until, created_at, updated_at";

/// Enqueue a job unless one with the same idempotency key already exists.
///
/// Returns the job id, or `None` when the key was already present (the
/// duplicate is silently dropped).
pub async fn enqueue_unique(
    db: &Database,
    kind: &str,
    case_id: Option<&str>,
    idempotency_key: &str,
    payload: &str,
) -> Result<Option<i64>, ByfrostError> {
    let kind = kind.to_string();
    let case_id = case_id.map(|s| s.to_string());
    let idempotency_key = idempotency_key.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO jobs (kind, case_id, idempotency_key, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind, case_id, idempotency_key, payload],
            )?;
            if inserted == 0 {
                Ok(None)
            } else {
                Ok(Some(conn.last_insert_rowid()))
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Dequeue the next pending job of the given kind.
///
/// Atomically selects the oldest pending job and marks it "processing" with
/// a 5-minute lock timeout. Returns `None` if the queue is empty.
pub async fn dequeue(db: &Database, kind: &str) -> Result<Option<Job>, ByfrostError> {
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE kind = ?1 AND status = 'pending'
                     ORDER BY id ASC
                     LIMIT 1"
                ))?;
                stmt.query_row(params![kind], row_to_job)
            };

            match result {
                Ok(job) => {
                    tx.execute(
                        "UPDATE jobs SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![job.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(Job {
                        status: "processing".to_string(),
                        ..job
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge successful processing of a job.
pub async fn ack(db: &Database, id: i64) -> Result<(), ByfrostError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'completed',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a job attempt as failed.
///
/// Increments attempts. At max_attempts the job is parked as "failed";
/// otherwise it returns to "pending" for retry with the lock cleared.
pub async fn fail(db: &Database, id: i64) -> Result<(), ByfrostError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i32, i32) = conn.query_row(
                "SELECT attempts, max_attempts FROM jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let next_status = if new_attempts >= max_attempts {
                "failed"
            } else {
                "pending"
            };
            conn.execute(
                "UPDATE jobs SET status = ?1, attempts = ?2, locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![next_status, new_attempts, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
