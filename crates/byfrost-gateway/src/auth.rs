// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway authentication.
//!
//! Three surfaces, three schemes:
//! - Webhook: per-instance shared secret, accepted from a header, a query
//!   parameter, or a path segment -- checked in that precedence, for
//!   providers that cannot customize headers.
//! - `/v1/send`: the service bearer token. No token configured means all
//!   requests are rejected (fail-closed).
//! - Presence: per-employee bearer tokens resolved against contacts.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use byfrost_storage::queries::contacts;
use byfrost_storage::{Contact, Database};

use crate::server::GatewayState;

/// Where the webhook secret was found, in checking precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Header,
    Query,
    Path,
}

/// Check the webhook shared secret: header, then query parameter, then path
/// segment. Returns the matching source, or `None` when nothing matched.
pub fn check_webhook_secret(
    headers: &HeaderMap,
    query_secret: Option<&str>,
    path_secret: Option<&str>,
    expected: &str,
) -> Option<SecretSource> {
    if let Some(header) = headers.get("x-webhook-secret").and_then(|v| v.to_str().ok()) {
        if header == expected {
            return Some(SecretSource::Header);
        }
    }
    if query_secret == Some(expected) {
        return Some(SecretSource::Query);
    }
    if path_secret == Some(expected) {
        return Some(SecretSource::Path);
    }
    None
}

/// Middleware guarding `/v1/send` with the service bearer token.
///
/// Fail-closed: no configured token rejects every request.
pub async fn service_auth_middleware(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(ref expected) = state.config.server.api_bearer_token else {
        tracing::error!("send API has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Resolve the presence bearer token to an active employee contact.
pub async fn employee_from_bearer(
    db: &Database,
    headers: &HeaderMap,
) -> Result<Contact, StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let contact = contacts::find_by_api_token(db, token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if contact.role != "employee" {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(contact)
}
