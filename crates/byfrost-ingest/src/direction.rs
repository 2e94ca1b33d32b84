// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message direction resolution.
//!
//! Resolution order: explicit self-sent flags, then explicit direction/event
//! keywords, then the forced hint from request routing, then the
//! sender-vs-instance phone heuristic. A forced direction is advisory only:
//! explicit provider signals always win, so a misconfigured outbound
//! endpoint cannot misfile real traffic.

use byfrost_core::Direction;
use serde_json::Value;

use crate::normalize::self_sent_flag;

/// Direction/event values that mean the instance sent the message.
const OUTBOUND_TOKENS: &[&str] = &["out", "outbound", "outgoing", "sent", "send"];

/// Direction/event values that mean the counterpart sent the message.
const INBOUND_TOKENS: &[&str] = &["in", "inbound", "incoming", "received", "receive"];

/// Resolve the direction of a message.
///
/// `sender_phone` is the normalized sender endpoint (when the payload has
/// one) and `instance_phone` the instance's own number; they feed the final
/// heuristic only.
pub fn resolve_direction(
    payload: &Value,
    sender_phone: Option<&str>,
    instance_phone: &str,
    forced: Option<Direction>,
) -> Direction {
    // 1. Explicit self-sent flags are authoritative.
    if let Some(from_me) = self_sent_flag(payload).or_else(|| nested_self_sent(payload)) {
        return if from_me {
            Direction::Outbound
        } else {
            Direction::Inbound
        };
    }

    // 2. Explicit direction/event keywords.
    if let Some(direction) = keyword_direction(payload) {
        return direction;
    }

    // 3. The forced hint, absent any contrary evidence above.
    if let Some(forced) = forced {
        return forced;
    }

    // 4. Heuristic: a message from the instance's own number is outbound.
    if let Some(sender) = sender_phone {
        if sender == instance_phone {
            return Direction::Outbound;
        }
    }
    Direction::Inbound
}

fn nested_self_sent(payload: &Value) -> Option<bool> {
    for key in ["data", "message"] {
        if let Some(obj) = payload.get(key) {
            if let Some(flag) = self_sent_flag(obj) {
                return Some(flag);
            }
        }
    }
    None
}

fn keyword_direction(payload: &Value) -> Option<Direction> {
    for key in ["direction", "dir", "event", "status"] {
        let raw = payload
            .get(key)
            .and_then(Value::as_str)
            .or_else(|| payload.get("data").and_then(|d| d.get(key)).and_then(Value::as_str));
        let Some(raw) = raw else { continue };
        for token in raw.split(['.', ':', '/']).map(|t| t.trim().to_ascii_lowercase()) {
            if OUTBOUND_TOKENS.contains(&token.as_str()) {
                return Some(Direction::Outbound);
            }
            if INBOUND_TOKENS.contains(&token.as_str()) {
                return Some(Direction::Inbound);
            }
        }
    }
    None
}
