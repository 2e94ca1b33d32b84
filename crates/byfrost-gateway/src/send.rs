// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outbound send endpoint.
//!
//! Fire-and-log: the outbound message row is always persisted first, then
//! external delivery is attempted best-effort with a bounded timeout. A
//! delivery failure (or missing provider credentials) degrades to "prepared
//! but not sent" and never aborts the primary write.

use std::str::FromStr;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use byfrost_core::{ByfrostError, Direction, MessageKind, NormalizedMessage};
use byfrost_ingest::{normalize_phone, SenderIdentity};
use byfrost_storage::ingest::apply_inbound;
use byfrost_storage::queries::instances;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::server::GatewayState;

/// Request body for POST /v1/send.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub tenant_id: String,
    pub instance_id: String,
    pub to: String,
    /// text | image | audio | video | document | location
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

/// Response body for POST /v1/send.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub ok: bool,
    /// The outbound message row was written (false only for duplicates).
    pub persisted: bool,
    pub duplicate: bool,
    /// Best-effort case link; unlinked is a normal outcome.
    pub case_id: Option<String>,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /v1/send
pub async fn post_send(
    State(state): State<GatewayState>,
    Json(body): Json<SendRequest>,
) -> Response {
    match send_inner(&state, body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(ByfrostError::Rule(code)) => (
            StatusCode::OK,
            Json(SendResponse {
                ok: false,
                persisted: false,
                duplicate: false,
                case_id: None,
                delivered: false,
                delivery_error: None,
                reason: Some(code),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "send failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SendResponse {
                    ok: false,
                    persisted: false,
                    duplicate: false,
                    case_id: None,
                    delivered: false,
                    delivery_error: None,
                    reason: Some("internal".to_string()),
                }),
            )
                .into_response()
        }
    }
}

async fn send_inner(
    state: &GatewayState,
    body: SendRequest,
) -> Result<SendResponse, ByfrostError> {
    let instance = instances::get_instance(&state.db, &body.instance_id)
        .await?
        .filter(|i| i.tenant_id == body.tenant_id)
        .ok_or_else(|| ByfrostError::Rule("unknown_instance".to_string()))?;

    let kind = match body.kind.as_deref() {
        None | Some("") => MessageKind::Text,
        Some(raw) => MessageKind::from_str(raw)
            .map_err(|_| ByfrostError::Rule("unsupported_kind".to_string()))?,
    };
    if body.text.is_none() && body.media_url.is_none() {
        return Err(ByfrostError::Rule("empty_message".to_string()));
    }

    let cc = &state.config.webhook.default_country_code;
    let to = normalize_phone(&body.to, cc)
        .ok_or_else(|| ByfrostError::Rule("invalid_recipient".to_string()))?;

    let msg = NormalizedMessage {
        kind,
        to: Some(to.clone()),
        text: body.text.clone(),
        media_url: body.media_url.clone(),
        ..Default::default()
    };

    // Route for best-effort case linking only; the sender here is the
    // platform itself, not a contact.
    let nobody = SenderIdentity {
        contact: None,
        role: None,
        is_group: false,
    };
    let decision = state.router.route(&state.db, &instance, &nobody).await?;
    let correlation_id = format!("send:{}", uuid::Uuid::new_v4());
    let plan = state
        .engine
        .plan(
            &state.db,
            &instance,
            &decision,
            &nobody,
            &msg,
            Direction::Outbound,
            &correlation_id,
            None,
        )
        .await?;
    let outcome = apply_inbound(&state.db, plan).await?;

    if outcome.duplicate {
        return Ok(SendResponse {
            ok: true,
            persisted: false,
            duplicate: true,
            case_id: None,
            delivered: false,
            delivery_error: None,
            reason: Some("near_duplicate_suppressed".to_string()),
        });
    }

    // Best-effort external delivery, after the durable write.
    let (delivered, delivery_error) = deliver(state, &instance, &to, kind, &body).await;

    Ok(SendResponse {
        ok: true,
        persisted: true,
        duplicate: false,
        case_id: outcome.case_id,
        delivered,
        delivery_error,
        reason: None,
    })
}

/// Attempt delivery through the provider send API. Missing credentials
/// degrade to "prepared but not sent"; failures are recorded, never raised.
async fn deliver(
    state: &GatewayState,
    instance: &byfrost_storage::Instance,
    to: &str,
    kind: MessageKind,
    body: &SendRequest,
) -> (bool, Option<String>) {
    let Some(ref api_url) = state.config.webhook.provider_api_url else {
        return (false, Some("not_configured".to_string()));
    };

    let mut request = state
        .http
        .post(format!("{}/send", api_url.trim_end_matches('/')))
        .json(&serde_json::json!({
            "instance": instance.provider_id,
            "to": to,
            "kind": kind.to_string(),
            "text": body.text,
            "mediaUrl": body.media_url,
        }));
    if let Some(ref token) = state.config.webhook.provider_api_token {
        request = request.bearer_auth(token);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => (true, None),
        Ok(response) => {
            let status = response.status();
            warn!(%status, "provider rejected outbound delivery");
            (false, Some(format!("provider_status_{}", status.as_u16())))
        }
        Err(e) => {
            warn!(error = %e, "outbound delivery attempt failed");
            (false, Some("provider_unreachable".to_string()))
        }
    }
}
