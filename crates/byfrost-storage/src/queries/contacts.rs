// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone-keyed contact (vendor/employee/customer) lookups.

use byfrost_core::ByfrostError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::Contact;

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        phone: row.get(2)?,
        display_name: row.get(3)?,
        role: row.get(4)?,
        api_token: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const CONTACT_COLUMNS: &str =
    "id, tenant_id, phone, display_name, role, api_token, active, created_at";

/// Insert a new contact. Fails on a duplicate (tenant, phone) pair.
pub async fn insert_contact(db: &Database, contact: &Contact) -> Result<(), ByfrostError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, tenant_id, phone, display_name, role, api_token,
                     active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    contact.id,
                    contact.tenant_id,
                    contact.phone,
                    contact.display_name,
                    contact.role,
                    contact.api_token,
                    contact.active,
                    contact.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Find an active contact matching any of the given phone variants.
///
/// Providers are inconsistent about the Brazilian mobile ninth digit, so the
/// caller passes every plausible rendering of the sender number; any variant
/// hit resolves to the same stored identity.
pub async fn find_by_phone_variants(
    db: &Database,
    tenant_id: &str,
    variants: &[String],
) -> Result<Option<Contact>, ByfrostError> {
    if variants.is_empty() {
        return Ok(None);
    }
    let tenant_id = tenant_id.to_string();
    let variants = variants.to_vec();
    db.connection()
        .call(move |conn| {
            let placeholders = (0..variants.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {CONTACT_COLUMNS}
                 FROM contacts
                 WHERE tenant_id = ?1 AND active = 1 AND phone IN ({placeholders})
                 ORDER BY created_at ASC
                 LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut sql_params: Vec<&dyn rusqlite::ToSql> = vec![&tenant_id];
            for v in &variants {
                sql_params.push(v);
            }
            match stmt.query_row(sql_params.as_slice(), row_to_contact) {
                Ok(contact) => Ok(Some(contact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve an active contact by its presence bearer token.
pub async fn find_by_api_token(
    db: &Database,
    token: &str,
) -> Result<Option<Contact>, ByfrostError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts
                 WHERE api_token = ?1 AND active = 1"
            ))?;
            match stmt.query_row(params![token], row_to_contact) {
                Ok(contact) => Ok(Some(contact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
