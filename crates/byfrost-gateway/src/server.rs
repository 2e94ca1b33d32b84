// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. The webhook routes carry
//! their own per-instance secret gate; `/v1/send` sits behind the service
//! bearer token; the presence routes authenticate per-employee tokens.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use byfrost_config::ByfrostConfig;
use byfrost_core::ByfrostError;
use byfrost_journey::{CaseEngine, JourneyRouter};
use byfrost_presence::PresenceClock;
use byfrost_storage::Database;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::auth::service_auth_middleware;
use crate::{presence_api, send, webhook};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub db: Database,
    pub config: Arc<ByfrostConfig>,
    pub router: Arc<JourneyRouter>,
    pub engine: Arc<CaseEngine>,
    /// Present only when the presence clock is enabled and its journey exists.
    pub presence: Option<Arc<PresenceClock>>,
    pub http: reqwest::Client,
    pub start_time: std::time::Instant,
}

impl GatewayState {
    /// Assemble the state from configuration and an open database.
    pub fn new(
        config: ByfrostConfig,
        db: Database,
        presence: Option<PresenceClock>,
    ) -> Result<Self, ByfrostError> {
        let router = Arc::new(JourneyRouter::new(
            config.routing.fallback_journey_key.clone(),
            config.routing.vendor_journey_key.clone(),
        ));
        let engine = Arc::new(CaseEngine::new(config.webhook.outbound_dedup_window_secs));
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.webhook.delivery_timeout_secs))
            .build()
            .map_err(|e| ByfrostError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            db,
            config: Arc::new(config),
            router,
            engine,
            presence: presence.map(Arc::new),
            http,
            start_time: std::time::Instant::now(),
        })
    }
}

/// Build the full gateway router.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(get_health))
        .with_state(state.clone());

    // The webhook authenticates per instance (header > query > path secret),
    // so no route-level middleware here.
    let webhook_routes = Router::new()
        .route(
            "/webhook/{provider_id}",
            post(webhook::post_webhook).get(webhook::get_webhook_probe),
        )
        .route(
            "/webhook/{provider_id}/{secret}",
            post(webhook::post_webhook_with_secret).get(webhook::get_webhook_probe_with_secret),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/send", post(send::post_send))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            service_auth_middleware,
        ))
        .with_state(state.clone());

    // Presence auth is per-employee and needs a database lookup; the
    // handlers resolve the bearer themselves.
    let presence_routes = Router::new()
        .route("/v1/presence/punch", post(presence_api::post_punch))
        .route("/v1/presence/justify", post(presence_api::post_justify))
        .route("/v1/presence/close", post(presence_api::post_close))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(api_routes)
        .merge(presence_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process is stopped.
pub async fn start_server(state: GatewayState) -> Result<(), ByfrostError> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ByfrostError::Webhook {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| ByfrostError::Webhook {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health -- unauthenticated liveness.
pub async fn get_health(
    axum::extract::State(state): axum::extract::State<GatewayState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
