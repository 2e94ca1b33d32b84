// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel instance lookups.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::Instance;

fn row_to_instance(row: &rusqlite::Row<'_>) -> rusqlite::Result<Instance> {
    Ok(Instance {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        provider_id: row.get(2)?,
        phone: row.get(3)?,
        webhook_secret: row.get(4)?,
        business_flow_enabled: row.get(5)?,
        audit_only: row.get(6)?,
        default_journey_id: row.get(7)?,
        owner_user_id: row.get(8)?,
        active: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const INSTANCE_COLUMNS: &str = "id, tenant_id, provider_id, phone, webhook_secret, \
     business_flow_enabled, audit_only, default_journey_id, owner_user_id, active, \
     created_at, updated_at";

/// Insert a new instance.
pub async fn insert_instance(db: &Database, instance: &Instance) -> Result<(), ByfrostError> {
    let instance = instance.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO instances (id, tenant_id, provider_id, phone, webhook_secret,
                     business_flow_enabled, audit_only, default_journey_id, owner_user_id,
                     active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    instance.id,
                    instance.tenant_id,
                    instance.provider_id,
                    instance.phone,
                    instance.webhook_secret,
                    instance.business_flow_enabled,
                    instance.audit_only,
                    instance.default_journey_id,
                    instance.owner_user_id,
                    instance.active,
                    instance.created_at,
                    instance.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get an instance by id.
pub async fn get_instance(db: &Database, id: &str) -> Result<Option<Instance>, ByfrostError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INSTANCE_COLUMNS} FROM instances WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_instance);
            match result {
                Ok(instance) => Ok(Some(instance)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve the instance owning a provider-side channel id.
///
/// Duplicate rows for the same provider id are tolerated: the most recently
/// updated active instance wins, deterministically.
pub async fn resolve_by_provider_id(
    db: &Database,
    provider_id: &str,
) -> Result<Option<Instance>, ByfrostError> {
    let provider_id = provider_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INSTANCE_COLUMNS} FROM instances
                 WHERE provider_id = ?1 AND active = 1
                 ORDER BY updated_at DESC, id DESC
                 LIMIT 1"
            ))?;
            let result = stmt.query_row(params![provider_id], row_to_instance);
            match result {
                Ok(instance) => Ok(Some(instance)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
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

    fn make_instance(id: &str, updated_at: &str) -> Instance {
        Instance {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            provider_id: "wa-4711".to_string(),
            phone: "+5511999990000".to_string(),
            webhook_secret: "s3cret".to_string(),
            business_flow_enabled: true,
            audit_only: false,
            default_journey_id: None,
            owner_user_id: None,
            active: true,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_instance() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance("i1", "2026-01-01T00:00:00.000Z");
        insert_instance(&db, &instance).await.unwrap();

        let got = get_instance(&db, "i1").await.unwrap().unwrap();
        assert_eq!(got, instance);
        assert!(get_instance(&db, "missing").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_provider_rows_resolve_to_most_recently_updated() {
        let (db, _dir) = setup_db().await;
        insert_instance(&db, &make_instance("older", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        insert_instance(&db, &make_instance("newer", "2026-02-01T00:00:00.000Z"))
            .await
            .unwrap();

        let resolved = resolve_by_provider_id(&db, "wa-4711").await.unwrap().unwrap();
        assert_eq!(resolved.id, "newer");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn inactive_instances_are_never_resolved() {
        let (db, _dir) = setup_db().await;
        let mut inactive = make_instance("i-off", "2026-03-01T00:00:00.000Z");
        inactive.active = false;
        insert_instance(&db, &inactive).await.unwrap();
        insert_instance(&db, &make_instance("i-on", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        let resolved = resolve_by_provider_id(&db, "wa-4711").await.unwrap().unwrap();
        assert_eq!(resolved.id, "i-on");

        db.close().await.unwrap();
    }
}
