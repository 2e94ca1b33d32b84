// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Journey catalog and tenant-journey enablement.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::{Journey, TenantJourney};

fn row_to_journey(row: &rusqlite::Row<'_>) -> rusqlite::Result<Journey> {
    Ok(Journey {
        id: row.get(0)?,
        key: row.get(1)?,
        name: row.get(2)?,
        is_crm: row.get(3)?,
        states: row.get(4)?,
        default_state: row.get(5)?,
        labels: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const JOURNEY_COLUMNS: &str = "id, key, name, is_crm, states, default_state, labels, created_at";

/// Insert a new journey into the catalog.
pub async fn insert_journey(db: &Database, journey: &Journey) -> Result<(), ByfrostError> {
    let journey = journey.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO journeys (id, key, name, is_crm, states, default_state, labels, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    journey.id,
                    journey.key,
                    journey.name,
                    journey.is_crm,
                    journey.states,
                    journey.default_state,
                    journey.labels,
                    journey.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a journey by id.
pub async fn get_journey(db: &Database, id: &str) -> Result<Option<Journey>, ByfrostError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOURNEY_COLUMNS} FROM journeys WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_journey) {
                Ok(journey) => Ok(Some(journey)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a journey by its catalog key.
pub async fn get_journey_by_key(db: &Database, key: &str) -> Result<Option<Journey>, ByfrostError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOURNEY_COLUMNS} FROM journeys WHERE key = ?1"))?;
            match stmt.query_row(params![key], row_to_journey) {
                Ok(journey) => Ok(Some(journey)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Enable a journey for a tenant, or update its configuration if already
/// enabled. One row per (tenant, journey); toggling upserts.
pub async fn enable_for_tenant(db: &Database, tj: &TenantJourney) -> Result<(), ByfrostError> {
    let tj = tj.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenant_journeys (id, tenant_id, journey_id, config, position, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (tenant_id, journey_id)
                 DO UPDATE SET config = excluded.config, position = excluded.position",
                params![tj.id, tj.tenant_id, tj.journey_id, tj.config, tj.position, tj.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Journeys enabled for a tenant, in insertion (position) order, joined with
/// their catalog definitions.
pub async fn enabled_for_tenant(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<(TenantJourney, Journey)>, ByfrostError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tj.id, tj.tenant_id, tj.journey_id, tj.config, tj.position, tj.created_at,
                        j.id, j.key, j.name, j.is_crm, j.states, j.default_state, j.labels, j.created_at
                 FROM tenant_journeys tj
                 JOIN journeys j ON j.id = tj.journey_id
                 WHERE tj.tenant_id = ?1
                 ORDER BY tj.position ASC, tj.created_at ASC",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok((
                    TenantJourney {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        journey_id: row.get(2)?,
                        config: row.get(3)?,
                        position: row.get(4)?,
                        created_at: row.get(5)?,
                    },
                    Journey {
                        id: row.get(6)?,
                        key: row.get(7)?,
                        name: row.get(8)?,
                        is_crm: row.get(9)?,
                        states: row.get(10)?,
                        default_state: row.get(11)?,
                        labels: row.get(12)?,
                        created_at: row.get(13)?,
                    },
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Get the tenant-journey row for one (tenant, journey) pair.
pub async fn get_tenant_journey(
    db: &Database,
    tenant_id: &str,
    journey_id: &str,
) -> Result<Option<TenantJourney>, ByfrostError> {
    let tenant_id = tenant_id.to_string();
    let journey_id = journey_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, journey_id, config, position, created_at
                 FROM tenant_journeys WHERE tenant_id = ?1 AND journey_id = ?2",
            )?;
            match stmt.query_row(params![tenant_id, journey_id], |row| {
                Ok(TenantJourney {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    journey_id: row.get(2)?,
                    config: row.get(3)?,
                    position: row.get(4)?,
                    created_at: row.get(5)?,
                })
            }) {
                Ok(tj) => Ok(Some(tj)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
