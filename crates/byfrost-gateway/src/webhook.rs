// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound webhook: gate, normalize, resolve, route, apply.
//!
//! Every invocation -- success, failure, duplicate, unauthorized, ignored --
//! writes one diagnostic inbox record, including early-exit paths. Business
//! rule failures come back as structured `{ ok: false, reason }` bodies;
//! unexpected errors are caught at the top and converted to a generic
//! internal-error response.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use byfrost_core::{
    ByfrostError, Direction, InboxOutcome, MessageKind, NormalizedMessage, PunchKind, PunchSource,
};
use byfrost_ingest::{normalize, resolve_direction, resolve_sender, SenderIdentity};
use byfrost_storage::ingest::{apply_inbound, CaseDisposition, InboundPlan, MessageSpec};
use byfrost_storage::queries::presence::PunchResult;
use byfrost_storage::queries::{inbox, instances};
use byfrost_storage::{InboxRecord, Instance};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{error, warn};

use crate::auth::check_webhook_secret;
use crate::server::GatewayState;

/// POST /webhook/{provider_id}
pub async fn post_webhook(
    State(state): State<GatewayState>,
    Path(provider_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_webhook(state, provider_id, None, params, headers, body).await
}

/// POST /webhook/{provider_id}/{secret} -- for providers that can only
/// append the secret to the URL path.
pub async fn post_webhook_with_secret(
    State(state): State<GatewayState>,
    Path((provider_id, secret)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_webhook(state, provider_id, Some(secret), params, headers, body).await
}

/// GET /webhook/{provider_id} -- provider liveness/validation probe.
/// Logged, otherwise a no-op.
pub async fn get_webhook_probe(
    State(state): State<GatewayState>,
    Path(provider_id): Path<String>,
) -> Response {
    probe(state, provider_id).await
}

/// GET /webhook/{provider_id}/{secret}
pub async fn get_webhook_probe_with_secret(
    State(state): State<GatewayState>,
    Path((provider_id, _secret)): Path<(String, String)>,
) -> Response {
    probe(state, provider_id).await
}

async fn probe(state: GatewayState, provider_id: String) -> Response {
    log_inbox(
        &state,
        InboxRecord {
            instance_id: Some(provider_id),
            outcome: InboxOutcome::Ignored.to_string(),
            reason: Some("probe".to_string()),
            ..Default::default()
        },
    )
    .await;
    reply(StatusCode::OK, json!({ "ok": true }))
}

async fn handle_webhook(
    state: GatewayState,
    provider_id: String,
    path_secret: Option<String>,
    params: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // 1. Resolve the owning instance.
    let instance = match instances::resolve_by_provider_id(&state.db, &provider_id).await {
        Ok(Some(instance)) => instance,
        Ok(None) => {
            log_inbox(
                &state,
                InboxRecord {
                    instance_id: Some(provider_id),
                    outcome: InboxOutcome::Error.to_string(),
                    reason: Some("unknown_instance".to_string()),
                    raw_payload: raw_payload(&body),
                    ..Default::default()
                },
            )
            .await;
            return reply(
                StatusCode::NOT_FOUND,
                json!({ "ok": false, "accepted": false, "reason": "unknown_instance" }),
            );
        }
        Err(e) => return internal(&state, None, &body, e).await,
    };

    // 2. Shared secret: header > query > path.
    let authorized = check_webhook_secret(
        &headers,
        params.get("secret").map(String::as_str),
        path_secret.as_deref(),
        &instance.webhook_secret,
    );
    if authorized.is_none() {
        log_inbox(
            &state,
            InboxRecord {
                instance_id: Some(instance.id.clone()),
                outcome: InboxOutcome::Unauthorized.to_string(),
                reason: Some("bad_secret".to_string()),
                raw_payload: raw_payload(&body),
                ..Default::default()
            },
        )
        .await;
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({ "ok": false, "accepted": false, "reason": "bad_secret" }),
        );
    }

    // 3. Parse the body ourselves so malformed JSON still reaches the inbox.
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            log_inbox(
                &state,
                InboxRecord {
                    instance_id: Some(instance.id.clone()),
                    outcome: InboxOutcome::Error.to_string(),
                    reason: Some("malformed_json".to_string()),
                    raw_payload: raw_payload(&body),
                    ..Default::default()
                },
            )
            .await;
            return reply(
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "accepted": false, "reason": "malformed_json" }),
            );
        }
    };

    match process(&state, &instance, &params, &payload, &body).await {
        Ok(response) => response,
        Err(e) => match e {
            ByfrostError::Rule(code) => {
                log_inbox(
                    &state,
                    InboxRecord {
                        instance_id: Some(instance.id.clone()),
                        outcome: InboxOutcome::Error.to_string(),
                        reason: Some(code.clone()),
                        raw_payload: raw_payload(&body),
                        ..Default::default()
                    },
                )
                .await;
                reply(
                    StatusCode::OK,
                    json!({ "ok": false, "accepted": false, "reason": code }),
                )
            }
            ByfrostError::Routing(message) => {
                warn!(instance = instance.id.as_str(), %message, "routing failed");
                log_inbox(
                    &state,
                    InboxRecord {
                        instance_id: Some(instance.id.clone()),
                        outcome: InboxOutcome::Error.to_string(),
                        reason: Some("no_journey".to_string()),
                        raw_payload: raw_payload(&body),
                        ..Default::default()
                    },
                )
                .await;
                reply(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "ok": false, "accepted": false, "reason": "no_journey" }),
                )
            }
            other => internal(&state, Some(&instance), &body, other).await,
        },
    }
}

/// The main pipeline, once the call is authenticated and parsed.
async fn process(
    state: &GatewayState,
    instance: &Instance,
    params: &HashMap<String, String>,
    payload: &Value,
    body: &Bytes,
) -> Result<Response, ByfrostError> {
    let cc = &state.config.webhook.default_country_code;
    let msg = normalize(payload, cc);

    // Receipts and call events are acknowledged silently.
    if msg.is_receipt || msg.is_call_event {
        let reason = if msg.is_receipt { "receipt" } else { "call_event" };
        log_inbox(
            state,
            inbox_record_for(instance, &msg, None, None, InboxOutcome::Ignored, Some(reason)),
        )
        .await;
        return Ok(reply(
            StatusCode::OK,
            json!({ "ok": true, "accepted": false, "reason": reason }),
        ));
    }

    let forced = params
        .get("dir")
        .or_else(|| params.get("direction"))
        .and_then(|v| match v.to_ascii_lowercase().as_str() {
            "in" | "inbound" => Some(Direction::Inbound),
            "out" | "outbound" => Some(Direction::Outbound),
            _ => None,
        });
    let direction = resolve_direction(payload, msg.from.as_deref(), &instance.phone, forced);

    let correlation_id = msg
        .external_id
        .clone()
        .unwrap_or_else(|| format!("h:{}", hex::encode(Sha256::digest(body))));

    let sender = match (direction, msg.from.as_deref()) {
        (Direction::Inbound, Some(from)) => {
            resolve_sender(
                &state.db,
                &instance.tenant_id,
                from,
                state.config.routing.auto_create_customers,
            )
            .await?
        }
        _ => SenderIdentity {
            contact: None,
            role: None,
            is_group: false,
        },
    };

    // Presence commands are handled exclusively by the clock engine.
    if let Some(response) =
        try_presence_command(state, instance, &msg, direction, &sender).await?
    {
        return Ok(response);
    }

    // Audit-only instances store the message without business-flow routing.
    if instance.audit_only || !instance.business_flow_enabled {
        let plan = InboundPlan {
            case: CaseDisposition::Unlinked,
            message: MessageSpec {
                id: uuid::Uuid::new_v4().to_string(),
                instance_id: instance.id.clone(),
                direction: direction.to_string(),
                kind: msg.kind.to_string(),
                from_phone: msg.from.clone(),
                to_phone: msg.to.clone(),
                body: msg.text.clone(),
                media_url: msg.media_url.clone(),
                external_id: msg.external_id.clone(),
                correlation_id: correlation_id.clone(),
                raw_payload: Some(payload.to_string()),
            },
            set_state: None,
            merge_metadata: None,
            pendencies: Vec::new(),
            answer: None,
            jobs: Vec::new(),
            outbound_dedup_window_secs: None,
        };
        let outcome = apply_inbound(&state.db, plan).await?;
        let inbox_outcome = if outcome.duplicate {
            InboxOutcome::Duplicate
        } else {
            InboxOutcome::Processed
        };
        log_inbox(
            state,
            inbox_record_for(
                instance,
                &msg,
                Some(direction),
                Some(&correlation_id),
                inbox_outcome,
                Some("audit_only"),
            ),
        )
        .await;
        return Ok(reply(
            StatusCode::OK,
            json!({
                "ok": true,
                "accepted": !outcome.duplicate,
                "duplicate": outcome.duplicate,
                "reason": "audit_only",
            }),
        ));
    }

    // Route and apply.
    let decision = state.router.route(&state.db, instance, &sender).await?;
    let plan = state
        .engine
        .plan(
            &state.db,
            instance,
            &decision,
            &sender,
            &msg,
            direction,
            &correlation_id,
            Some(payload.to_string()),
        )
        .await?;
    let outcome = apply_inbound(&state.db, plan).await?;

    let inbox_outcome = if outcome.duplicate {
        InboxOutcome::Duplicate
    } else {
        InboxOutcome::Processed
    };
    log_inbox(
        state,
        inbox_record_for(
            instance,
            &msg,
            Some(direction),
            Some(&correlation_id),
            inbox_outcome,
            Some(decision.reason),
        ),
    )
    .await;

    Ok(reply(
        StatusCode::OK,
        json!({
            "ok": true,
            "accepted": !outcome.duplicate,
            "duplicate": outcome.duplicate,
            "case_id": outcome.case_id,
            "created_case": outcome.created_case,
        }),
    ))
}

/// Presence command words accepted over the channel, mapped to a forced
/// punch kind (`None` lets the sequence decide).
fn presence_command(text: &str) -> Option<Option<PunchKind>> {
    match text.trim().to_lowercase().as_str() {
        "ponto" => Some(None),
        "entrada" | "cheguei" => Some(Some(PunchKind::Entry)),
        "pausa" | "intervalo" => Some(Some(PunchKind::BreakStart)),
        "retorno" | "voltei" => Some(Some(PunchKind::BreakEnd)),
        "saida" | "saída" => Some(Some(PunchKind::Exit)),
        _ => None,
    }
}

/// Handle a presence command exclusively, when everything lines up: the
/// clock is enabled, the message is an inbound text from a recognized
/// employee, and the text is a command word.
async fn try_presence_command(
    state: &GatewayState,
    instance: &Instance,
    msg: &NormalizedMessage,
    direction: Direction,
    sender: &SenderIdentity,
) -> Result<Option<Response>, ByfrostError> {
    let Some(ref clock) = state.presence else {
        return Ok(None);
    };
    if !state.config.presence.enabled
        || direction != Direction::Inbound
        || msg.kind != MessageKind::Text
        || sender.role != Some(byfrost_core::ContactRole::Employee)
    {
        return Ok(None);
    }
    let Some(forced) = msg.text.as_deref().and_then(presence_command) else {
        return Ok(None);
    };
    let employee = sender
        .contact
        .as_ref()
        .ok_or_else(|| ByfrostError::Rule("no_identifiable_sender".to_string()))?;

    let result = clock
        .punch(
            &state.db,
            &instance.tenant_id,
            &employee.id,
            None,
            None,
            forced,
            PunchSource::Channel,
        )
        .await?;

    log_inbox(
        state,
        inbox_record_for(
            instance,
            msg,
            Some(Direction::Inbound),
            None,
            InboxOutcome::Processed,
            Some("presence_punch"),
        ),
    )
    .await;

    let body = match result {
        PunchResult::Recorded(outcome) => json!({
            "ok": true,
            "accepted": true,
            "reason": "presence_punch",
            "punch": {
                "kind": outcome.kind.to_string(),
                "case_id": outcome.case_id,
                "state": outcome.state,
                "flagged": outcome.flagged,
            },
        }),
        PunchResult::Rejected { case_id, reason } => json!({
            "ok": false,
            "accepted": false,
            "reason": reason,
            "case_id": case_id,
        }),
    };
    Ok(Some(reply(StatusCode::OK, body)))
}

fn inbox_record_for(
    instance: &Instance,
    msg: &NormalizedMessage,
    direction: Option<Direction>,
    correlation_id: Option<&str>,
    outcome: InboxOutcome,
    reason: Option<&str>,
) -> InboxRecord {
    InboxRecord {
        instance_id: Some(instance.id.clone()),
        direction: direction.map(|d| d.to_string()),
        kind: Some(msg.kind.to_string()),
        from_phone: msg.from.clone(),
        to_phone: msg.to.clone(),
        correlation_id: correlation_id.map(|s| s.to_string()),
        outcome: outcome.to_string(),
        reason: reason.map(|s| s.to_string()),
        raw_payload: None,
    }
}

/// Write the diagnostic inbox record; a failed write must never take the
/// request down with it.
async fn log_inbox(state: &GatewayState, record: InboxRecord) {
    if let Err(e) = inbox::record(&state.db, record).await {
        error!(error = %e, "failed to write diagnostic inbox record");
    }
}

async fn internal(
    state: &GatewayState,
    instance: Option<&Instance>,
    body: &Bytes,
    e: ByfrostError,
) -> Response {
    error!(error = %e, "webhook processing failed");
    log_inbox(
        state,
        InboxRecord {
            instance_id: instance.map(|i| i.id.clone()),
            outcome: InboxOutcome::Error.to_string(),
            reason: Some("internal".to_string()),
            raw_payload: raw_payload(body),
            ..Default::default()
        },
    )
    .await;
    reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "ok": false, "accepted": false, "reason": "internal" }),
    )
}

fn raw_payload(body: &Bytes) -> Option<String> {
    (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned())
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}
