// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `byfrost serve` command implementation.
//!
//! Opens the database (running migrations), bootstraps the presence journey
//! when the clock is enabled, assembles the gateway state, and serves until
//! a shutdown signal arrives.

use byfrost_config::model::ByfrostConfig;
use byfrost_core::{ByfrostError, PresenceState};
use byfrost_gateway::GatewayState;
use byfrost_presence::{PresenceClock, PresencePolicy};
use byfrost_storage::queries::journeys;
use byfrost_storage::{Database, Journey};
use tracing::{info, warn};

/// Catalog key of the built-in presence journey.
const PRESENCE_JOURNEY_KEY: &str = "presence";

/// Runs the `byfrost serve` command.
pub async fn run_serve(config: ByfrostConfig) -> Result<(), ByfrostError> {
    init_tracing(&config.service.log_level);

    info!("starting byfrost serve");

    let db = Database::open(&config.storage.database_path).await?;
    info!(path = config.storage.database_path.as_str(), "storage initialized");

    let presence = if config.presence.enabled {
        let journey_id = ensure_presence_journey(&db).await?;
        let policy = PresencePolicy::from_config(&config.presence);
        if policy.geofence.is_none() {
            warn!("presence enabled without a workplace location; geofence checks are off");
        }
        info!(journey_id = journey_id.as_str(), "presence clock enabled");
        Some(PresenceClock::new(policy, journey_id))
    } else {
        info!("presence clock disabled by configuration");
        None
    };

    let state = GatewayState::new(config, db.clone(), presence)?;

    tokio::select! {
        result = byfrost_gateway::start_server(state) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    db.close().await?;
    info!("byfrost serve shutdown complete");
    Ok(())
}

/// Find or create the presence journey catalog row.
///
/// The presence state machine is fixed; tenants enable it per journey
/// config, but the catalog entry itself is platform-owned.
async fn ensure_presence_journey(db: &Database) -> Result<String, ByfrostError> {
    if let Some(journey) = journeys::get_journey_by_key(db, PRESENCE_JOURNEY_KEY).await? {
        return Ok(journey.id);
    }

    let states = [
        PresenceState::AguardandoEntrada,
        PresenceState::EmExpediente,
        PresenceState::EmIntervalo,
        PresenceState::AguardandoSaida,
        PresenceState::PendenteJustificativa,
        PresenceState::PendenteAprovacao,
        PresenceState::Fechado,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect::<Vec<_>>();

    let journey = Journey {
        id: uuid::Uuid::new_v4().to_string(),
        key: PRESENCE_JOURNEY_KEY.to_string(),
        name: "Presença".to_string(),
        is_crm: false,
        states: serde_json::to_string(&states)
            .map_err(|e| ByfrostError::Internal(format!("presence states: {e}")))?,
        default_state: Some(PresenceState::AguardandoEntrada.to_string()),
        labels: None,
        created_at: byfrost_storage::database::now_utc(),
    };
    journeys::insert_journey(db, &journey).await?;
    info!(journey_id = journey.id.as_str(), "presence journey created");
    Ok(journey.id)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("byfrost={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn presence_journey_bootstrap_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("serve.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let first = ensure_presence_journey(&db).await.unwrap();
        let second = ensure_presence_journey(&db).await.unwrap();
        assert_eq!(first, second);

        let journey = journeys::get_journey_by_key(&db, PRESENCE_JOURNEY_KEY)
            .await
            .unwrap()
            .unwrap();
        assert!(journey.has_state("PENDENTE_APROVACAO"));
        assert_eq!(journey.initial_state().as_deref(), Some("AGUARDANDO_ENTRADA"));

        db.close().await.unwrap();
    }
}
