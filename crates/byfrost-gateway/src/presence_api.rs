// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence clock endpoints: punch, justify, and the human-gated day-close.
//!
//! All three authenticate a per-employee bearer token. Business-rule
//! outcomes (already exited, close blocked) come back as structured
//! `{ ok: false, reason }` bodies for the UI to display, never as 500s.

use std::str::FromStr;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use byfrost_core::{ByfrostError, GeoPoint, PunchKind, PunchSource};
use byfrost_storage::queries::presence::PunchResult;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::employee_from_bearer;
use crate::server::GatewayState;

/// Request body for POST /v1/presence/punch.
#[derive(Debug, Deserialize)]
pub struct PunchRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// ENTRY | BREAK_START | BREAK_END | EXIT; omitted lets the sequence decide.
    #[serde(default)]
    pub forced_kind: Option<String>,
    /// app | channel
    #[serde(default)]
    pub source: Option<String>,
}

/// Response body for POST /v1/presence/punch.
#[derive(Debug, Serialize)]
pub struct PunchResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within_radius: Option<bool>,
    pub flagged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /v1/presence/punch
pub async fn post_punch(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<PunchRequest>,
) -> Response {
    let employee = match employee_from_bearer(&state.db, &headers).await {
        Ok(employee) => employee,
        Err(status) => return status.into_response(),
    };
    let Some(ref clock) = state.presence else {
        return presence_disabled();
    };

    let coords = match (body.latitude, body.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
        _ => None,
    };
    let forced_kind = match body.forced_kind.as_deref() {
        None | Some("") => None,
        Some(raw) => match PunchKind::from_str(raw) {
            Ok(kind) => Some(kind),
            Err(_) => {
                return rule_reply("invalid_punch_kind");
            }
        },
    };
    let source = match body.source.as_deref() {
        Some("channel") => PunchSource::Channel,
        _ => PunchSource::App,
    };

    match clock
        .punch(
            &state.db,
            &body.tenant_id,
            &employee.id,
            coords,
            body.accuracy,
            forced_kind,
            source,
        )
        .await
    {
        Ok(PunchResult::Recorded(outcome)) => (
            StatusCode::OK,
            Json(PunchResponse {
                ok: true,
                kind: Some(outcome.kind.to_string()),
                case_id: Some(outcome.case_id),
                state: Some(outcome.state),
                distance_m: outcome.distance_m,
                within_radius: outcome.within_radius,
                flagged: outcome.flagged,
                reason: None,
            }),
        )
            .into_response(),
        Ok(PunchResult::Rejected { case_id, reason }) => (
            StatusCode::OK,
            Json(PunchResponse {
                ok: false,
                kind: None,
                case_id: Some(case_id),
                state: None,
                distance_m: None,
                within_radius: None,
                flagged: false,
                reason: Some(reason),
            }),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

/// Request body for POST /v1/presence/justify.
#[derive(Debug, Deserialize)]
pub struct JustifyRequest {
    pub case_id: String,
    pub pendency_id: String,
    pub answer: String,
}

/// Response body for POST /v1/presence/justify.
#[derive(Debug, Serialize)]
pub struct JustifyResponse {
    pub ok: bool,
    pub state: Option<String>,
    pub approval_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /v1/presence/justify
pub async fn post_justify(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<JustifyRequest>,
) -> Response {
    if let Err(status) = employee_from_bearer(&state.db, &headers).await {
        return status.into_response();
    }
    let Some(ref clock) = state.presence else {
        return presence_disabled();
    };

    match clock
        .justify(&state.db, &body.case_id, &body.pendency_id, &body.answer)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(JustifyResponse {
                ok: outcome.answered,
                state: Some(outcome.state),
                approval_created: outcome.approval_created,
                reason: (!outcome.answered).then(|| "pendency_not_open".to_string()),
            }),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

/// Request body for POST /v1/presence/close.
#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub tenant_id: String,
    pub case_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Response body for POST /v1/presence/close.
#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub ok: bool,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<i64>,
}

/// POST /v1/presence/close -- the explicitly human-triggered day-close.
pub async fn post_close(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<CloseRequest>,
) -> Response {
    if let Err(status) = employee_from_bearer(&state.db, &headers).await {
        return status.into_response();
    }
    let Some(ref clock) = state.presence else {
        return presence_disabled();
    };

    match clock.close_day(&state.db, &body.case_id, body.note).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(CloseResponse {
                ok: outcome.closed,
                closed: outcome.closed,
                blocked_reason: outcome.blocked_reason,
                minutes_delta: outcome.minutes_delta,
                balance_after: outcome.balance_after,
            }),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

fn presence_disabled() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "ok": false, "reason": "presence_disabled" })),
    )
        .into_response()
}

fn rule_reply(reason: &str) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "ok": false, "reason": reason })),
    )
        .into_response()
}

fn internal(e: ByfrostError) -> Response {
    error!(error = %e, "presence endpoint failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "ok": false, "reason": "internal" })),
    )
        .into_response()
}
