// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sender identity resolution.
//!
//! Maps a normalized sender endpoint to a tenant-scoped contact (vendor,
//! employee, or customer), matching every Brazilian mobile-digit variant of
//! the number. Unknown senders optionally auto-create a customer contact;
//! vendors and employees must pre-exist.

use std::str::FromStr;

use byfrost_core::{ByfrostError, ContactRole};
use byfrost_storage::queries::contacts;
use byfrost_storage::{Contact, Database};
use tracing::debug;

use crate::phone::{br_variants, is_group_endpoint};

/// The resolved sender of an inbound message.
#[derive(Debug, Clone)]
pub struct SenderIdentity {
    pub contact: Option<Contact>,
    pub role: Option<ContactRole>,
    /// The endpoint is a group/broadcast id; no individual identity applies.
    pub is_group: bool,
}

impl SenderIdentity {
    /// True when the sender is a recognized tenant vendor.
    pub fn is_vendor(&self) -> bool {
        self.role == Some(ContactRole::Vendor)
    }
}

/// Resolve the sender of an inbound message to a stable identity.
///
/// `from` must already be normalized (`+<cc><digits>` or an opaque group
/// id). When no contact matches and `auto_create_customer` is set, a
/// customer contact is created so follow-up messages resolve consistently.
pub async fn resolve_sender(
    db: &Database,
    tenant_id: &str,
    from: &str,
    auto_create_customer: bool,
) -> Result<SenderIdentity, ByfrostError> {
    if is_group_endpoint(from) {
        return Ok(SenderIdentity {
            contact: None,
            role: None,
            is_group: true,
        });
    }

    let variants = br_variants(from);
    if let Some(contact) = contacts::find_by_phone_variants(db, tenant_id, &variants).await? {
        let role = ContactRole::from_str(&contact.role).ok();
        return Ok(SenderIdentity {
            contact: Some(contact),
            role,
            is_group: false,
        });
    }

    if !auto_create_customer {
        return Ok(SenderIdentity {
            contact: None,
            role: None,
            is_group: false,
        });
    }

    let contact = Contact {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        phone: from.to_string(),
        display_name: None,
        role: ContactRole::Customer.to_string(),
        api_token: None,
        active: true,
        created_at: byfrost_storage::database::now_utc(),
    };
    match contacts::insert_contact(db, &contact).await {
        Ok(()) => {
            debug!(tenant_id, phone = from, "auto-created customer contact");
            Ok(SenderIdentity {
                contact: Some(contact),
                role: Some(ContactRole::Customer),
                is_group: false,
            })
        }
        // A concurrent delivery created it first; adopt that row.
        Err(_) => {
            let existing = contacts::find_by_phone_variants(db, tenant_id, &variants).await?;
            let role = existing
                .as_ref()
                .and_then(|c| ContactRole::from_str(&c.role).ok());
            Ok(SenderIdentity {
                contact: existing,
                role,
                is_group: false,
            })
        }
    }
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

    async fn seed_contact(db: &Database, phone: &str, role: &str) {
        contacts::insert_contact(
            db,
            &Contact {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: "t1".to_string(),
                phone: phone.to_string(),
                display_name: Some("Seeded".to_string()),
                role: role.to_string(),
                api_token: None,
                active: true,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn vendor_resolves_through_the_ninth_digit_variant() {
        let (db, _dir) = setup_db().await;
        seed_contact(&db, "+5511987654321", "vendor").await;

        // Provider dropped the ninth digit.
        let identity = resolve_sender(&db, "t1", "+551187654321", false).await.unwrap();
        assert!(identity.is_vendor());
        assert_eq!(identity.contact.unwrap().phone, "+5511987654321");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_sender_auto_creates_a_customer() {
        let (db, _dir) = setup_db().await;

        let identity = resolve_sender(&db, "t1", "+5511999990000", true).await.unwrap();
        assert_eq!(identity.role, Some(ContactRole::Customer));

        // The second resolution finds the stored row.
        let again = resolve_sender(&db, "t1", "+5511999990000", true).await.unwrap();
        assert_eq!(
            identity.contact.unwrap().id,
            again.contact.unwrap().id,
            "repeat resolution must converge on one contact"
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_sender_without_auto_create_stays_anonymous() {
        let (db, _dir) = setup_db().await;

        let identity = resolve_sender(&db, "t1", "+5511999990000", false).await.unwrap();
        assert!(identity.contact.is_none());
        assert!(identity.role.is_none());
        assert!(!identity.is_vendor());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn group_endpoints_resolve_to_no_identity() {
        let (db, _dir) = setup_db().await;

        let identity = resolve_sender(&db, "t1", "123456789-987654@g.us", true)
            .await
            .unwrap();
        assert!(identity.is_group);
        assert!(identity.contact.is_none());

        db.close().await.unwrap();
    }
}
