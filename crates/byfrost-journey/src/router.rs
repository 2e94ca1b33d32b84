// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Journey selection.
//!
//! One channel instance often serves two worlds at once: an internal vendor
//! workflow and an external customer (CRM) workflow on the same phone
//! number. Selection is deterministic: instance default, then the first
//! tenant-enabled journey, then the hardcoded fallback -- with a vendor
//! override forcing recognized vendors onto the vendor journey, and a CRM
//! reroute pulling unrecognized senders off it.

use byfrost_core::ByfrostError;
use byfrost_ingest::SenderIdentity;
use byfrost_storage::queries::journeys;
use byfrost_storage::{Database, Instance, Journey};
use tracing::debug;

use crate::config::TenantJourneyConfig;

/// Routing decision with the selected journey and the reason it won.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub journey: Journey,
    pub config: TenantJourneyConfig,
    /// Human-readable reason for the selection (diagnostics only).
    pub reason: &'static str,
}

/// Selects the target journey for a (tenant, instance, sender) combination.
pub struct JourneyRouter {
    fallback_key: String,
    vendor_key: String,
}

impl JourneyRouter {
    pub fn new(fallback_key: impl Into<String>, vendor_key: impl Into<String>) -> Self {
        Self {
            fallback_key: fallback_key.into(),
            vendor_key: vendor_key.into(),
        }
    }

    /// Select exactly one journey.
    ///
    /// Priority order:
    /// 1. Instance-level explicit default journey
    /// 2. First tenant-enabled journey (insertion order)
    /// 3. The hardcoded fallback journey key
    ///
    /// Overrides: a recognized vendor sender is forced onto the vendor
    /// journey regardless of 1-3; a non-vendor landing on the vendor journey
    /// is rerouted to the first tenant-enabled CRM journey when one exists.
    pub async fn route(
        &self,
        db: &Database,
        instance: &Instance,
        sender: &SenderIdentity,
    ) -> Result<RouteDecision, ByfrostError> {
        let tenant_id = &instance.tenant_id;
        let enabled = journeys::enabled_for_tenant(db, tenant_id).await?;

        let (mut journey, mut reason) = if let Some(ref default_id) = instance.default_journey_id {
            match journeys::get_journey(db, default_id).await? {
                Some(journey) => (journey, "instance_default"),
                None => {
                    return Err(ByfrostError::Routing(format!(
                        "instance {} names unknown default journey {default_id}",
                        instance.id
                    )));
                }
            }
        } else if let Some((_, journey)) = enabled.first() {
            (journey.clone(), "first_enabled")
        } else {
            match journeys::get_journey_by_key(db, &self.fallback_key).await? {
                Some(journey) => (journey, "fallback_key"),
                None => {
                    return Err(ByfrostError::Routing(format!(
                        "no journey enabled for tenant {tenant_id} and fallback `{}` does not exist",
                        self.fallback_key
                    )));
                }
            }
        };

        if sender.is_vendor() && journey.key != self.vendor_key {
            if let Some(vendor_journey) = journeys::get_journey_by_key(db, &self.vendor_key).await? {
                journey = vendor_journey;
                reason = "vendor_override";
            }
        } else if !sender.is_vendor() && journey.key == self.vendor_key {
            if let Some((_, crm)) = enabled.iter().find(|(_, j)| j.is_crm) {
                journey = crm.clone();
                reason = "crm_reroute";
            }
        }

        let config = match journeys::get_tenant_journey(db, tenant_id, &journey.id).await? {
            Some(tj) => TenantJourneyConfig::parse(&tj.config),
            None => TenantJourneyConfig::default(),
        };

        debug!(
            tenant_id,
            journey = journey.key.as_str(),
            reason,
            "journey routed"
        );
        Ok(RouteDecision {
            journey,
            config,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byfrost_core::ContactRole;
    use byfrost_storage::queries::instances::insert_instance;
    use byfrost_storage::queries::journeys::{enable_for_tenant, insert_journey};
    use byfrost_storage::{Contact, TenantJourney};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        for (id, key, is_crm) in [
            ("j-vendor", "vendor_orders", false),
            ("j-crm", "crm", true),
            ("j-other", "support", false),
        ] {
            insert_journey(
                &db,
                &Journey {
                    id: id.to_string(),
                    key: key.to_string(),
                    name: key.to_string(),
                    is_crm,
                    states: r#"["novo","em_andamento","finalizado"]"#.to_string(),
                    default_state: Some("novo".to_string()),
                    labels: None,
                    created_at: "2026-01-01T00:00:00.000Z".to_string(),
                },
            )
            .await
            .unwrap();
        }
        (db, dir)
    }

    fn make_instance(default_journey: Option<&str>) -> Instance {
        Instance {
            id: "i1".to_string(),
            tenant_id: "t1".to_string(),
            provider_id: "wa-1".to_string(),
            phone: "+5511988880000".to_string(),
            webhook_secret: "s".to_string(),
            business_flow_enabled: true,
            audit_only: false,
            default_journey_id: default_journey.map(|s| s.to_string()),
            owner_user_id: None,
            active: true,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    fn vendor_sender() -> SenderIdentity {
        SenderIdentity {
            contact: Some(Contact {
                id: "c-vendor".to_string(),
                tenant_id: "t1".to_string(),
                phone: "+5511999990000".to_string(),
                display_name: None,
                role: "vendor".to_string(),
                api_token: None,
                active: true,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            }),
            role: Some(ContactRole::Vendor),
            is_group: false,
        }
    }

    fn anonymous_sender() -> SenderIdentity {
        SenderIdentity {
            contact: None,
            role: None,
            is_group: false,
        }
    }

    async fn enable(db: &Database, journey_id: &str, position: i64) {
        enable_for_tenant(
            db,
            &TenantJourney {
                id: format!("tj-{journey_id}"),
                tenant_id: "t1".to_string(),
                journey_id: journey_id.to_string(),
                config: "{}".to_string(),
                position,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
        )
        .await
        .unwrap();
    }

    fn router() -> JourneyRouter {
        JourneyRouter::new("vendor_orders", "vendor_orders")
    }

    #[tokio::test]
    async fn vendor_sender_routes_to_vendor_journey() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance(Some("j-vendor"));
        insert_instance(&db, &instance).await.unwrap();
        enable(&db, "j-vendor", 1).await;

        let decision = router().route(&db, &instance, &vendor_sender()).await.unwrap();
        assert_eq!(decision.journey.key, "vendor_orders");
        assert_eq!(decision.reason, "instance_default");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn non_vendor_on_vendor_default_reroutes_to_crm() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance(Some("j-vendor"));
        insert_instance(&db, &instance).await.unwrap();
        enable(&db, "j-vendor", 1).await;
        enable(&db, "j-crm", 2).await;

        let decision = router().route(&db, &instance, &anonymous_sender()).await.unwrap();
        assert_eq!(decision.journey.key, "crm");
        assert_eq!(decision.reason, "crm_reroute");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn non_vendor_stays_on_vendor_journey_without_a_crm_option() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance(Some("j-vendor"));
        insert_instance(&db, &instance).await.unwrap();
        enable(&db, "j-vendor", 1).await;

        let decision = router().route(&db, &instance, &anonymous_sender()).await.unwrap();
        assert_eq!(decision.journey.key, "vendor_orders");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn vendor_is_forced_off_a_crm_default() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance(Some("j-crm"));
        insert_instance(&db, &instance).await.unwrap();
        enable(&db, "j-crm", 1).await;

        let decision = router().route(&db, &instance, &vendor_sender()).await.unwrap();
        assert_eq!(decision.journey.key, "vendor_orders");
        assert_eq!(decision.reason, "vendor_override");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn first_enabled_journey_wins_without_instance_default() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance(None);
        insert_instance(&db, &instance).await.unwrap();
        enable(&db, "j-other", 1).await;
        enable(&db, "j-crm", 2).await;

        let decision = router().route(&db, &instance, &anonymous_sender()).await.unwrap();
        assert_eq!(decision.journey.key, "support");
        assert_eq!(decision.reason, "first_enabled");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fallback_key_applies_when_nothing_is_enabled() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance(None);
        insert_instance(&db, &instance).await.unwrap();

        let decision = router().route(&db, &instance, &anonymous_sender()).await.unwrap();
        assert_eq!(decision.journey.key, "vendor_orders");
        assert_eq!(decision.reason, "fallback_key");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_fallback_is_a_routing_error() {
        let (db, _dir) = setup_db().await;
        let instance = make_instance(None);
        insert_instance(&db, &instance).await.unwrap();

        let router = JourneyRouter::new("does_not_exist", "vendor_orders");
        let err = router.route(&db, &instance, &anonymous_sender()).await.unwrap_err();
        assert!(matches!(err, ByfrostError::Routing(_)));

        db.close().await.unwrap();
    }
}
