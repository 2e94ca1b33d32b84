// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider payload normalization.
//!
//! Converts arbitrary provider JSON into the canonical
//! [`NormalizedMessage`] record. Extraction is candidate-path driven:
//! every logical field has an ordered list of places providers put it, so
//! supporting a new provider means adding candidates, not code paths.
//!
//! Pure function; absent or ambiguous fields degrade to `None`, never error.

use byfrost_core::{GeoPoint, MessageKind, NormalizedMessage};
use serde_json::Value;

use crate::phone::normalize_phone;

/// Explicit type/event values that identify user content kinds.
const KIND_MAP: &[(&str, MessageKind)] = &[
    ("text", MessageKind::Text),
    ("chat", MessageKind::Text),
    ("conversation", MessageKind::Text),
    ("image", MessageKind::Image),
    ("picture", MessageKind::Image),
    ("photo", MessageKind::Image),
    ("audio", MessageKind::Audio),
    ("ptt", MessageKind::Audio),
    ("voice", MessageKind::Audio),
    ("video", MessageKind::Video),
    ("document", MessageKind::Document),
    ("file", MessageKind::Document),
    ("location", MessageKind::Location),
];

/// Type/event values that are provider callbacks, not user content.
const RECEIPT_KINDS: &[&str] = &[
    "status", "statuses", "delivery", "read", "ack", "receipt", "presence", "typing",
];

/// Type/event values that identify call events. Matched as whole tokens:
/// a body or type containing "callback" never qualifies.
const CALL_KINDS: &[&str] = &["call", "call_log", "voice_call", "video_call", "offer_call"];

/// Normalize one provider payload.
///
/// `default_cc` is the country calling code prepended to bare national
/// numbers.
pub fn normalize(payload: &Value, default_cc: &str) -> NormalizedMessage {
    let mut out = NormalizedMessage {
        instance_hint: instance_hint(payload),
        ..Default::default()
    };

    // Cloud-envelope receipts carry a `statuses` array and no message at all.
    if cloud_value(payload)
        .map(|v| v.get("statuses").and_then(Value::as_array).is_some_and(|a| !a.is_empty()))
        .unwrap_or(false)
    {
        out.is_receipt = true;
        return out;
    }

    let msg = message_object(payload);

    let raw_kind = first_str(msg, &["type", "messageType"])
        .or_else(|| first_str(payload, &["type", "event", "messageType"]))
        .map(|s| s.to_string());
    out.raw_kind = raw_kind.clone();

    if let Some(ref raw) = raw_kind {
        let tokens = kind_tokens(raw);
        if tokens.iter().any(|t| RECEIPT_KINDS.contains(&t.as_str())) {
            out.is_receipt = true;
            return out;
        }
    }

    out.is_call_event = detect_call_event(msg, raw_kind.as_deref());
    out.kind = infer_kind(msg, raw_kind.as_deref());

    // Endpoint mapping: the flat shape puts the chat counterpart in one
    // field; an explicit self-sent flag decides which side it is.
    let counterpart = first_str(
        msg,
        &["phone", "from", "sender", "author", "chatId", "key.remoteJid"],
    )
    .and_then(|raw| normalize_phone(raw, default_cc));
    let explicit_to = first_str(msg, &["to", "recipient", "receiver"])
        .and_then(|raw| normalize_phone(raw, default_cc));

    if self_sent_flag(payload).or_else(|| self_sent_flag(msg)) == Some(true) {
        out.to = explicit_to.or(counterpart);
    } else {
        out.from = counterpart;
        out.to = explicit_to;
    }

    out.text = first_str(
        msg,
        &[
            "text.body",
            "text.message",
            "text",
            "body",
            "caption",
            "image.caption",
            "video.caption",
            "document.caption",
            "message.conversation",
            "content",
        ],
    )
    .map(|s| s.to_string());

    out.media_url = first_str(
        msg,
        &[
            "mediaUrl",
            "image.imageUrl",
            "image.url",
            "image.link",
            "audio.audioUrl",
            "audio.url",
            "video.videoUrl",
            "video.url",
            "document.documentUrl",
            "document.url",
            "file.url",
        ],
    )
    .map(|s| s.to_string());

    out.location = extract_location(msg);
    out.external_id = first_str(msg, &["messageId", "id", "key.id", "wamid"])
        .map(|s| s.to_string());

    out
}

/// The `entry[0].changes[0].value` object of a Cloud API envelope, if this
/// payload is one.
fn cloud_value(payload: &Value) -> Option<&Value> {
    payload
        .get("entry")?
        .as_array()?
        .first()?
        .get("changes")?
        .as_array()?
        .first()?
        .get("value")
}

/// Locate the message object inside the payload.
///
/// Candidates, in order: the Cloud API envelope's first message, the generic
/// `data` envelope, an explicit `message` object, the payload root.
fn message_object(payload: &Value) -> &Value {
    if let Some(msg) = cloud_value(payload)
        .and_then(|v| v.get("messages"))
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    {
        return msg;
    }
    if let Some(data) = payload.get("data").filter(|d| d.is_object()) {
        return data;
    }
    if let Some(msg) = payload.get("message").filter(|m| m.is_object()) {
        return msg;
    }
    payload
}

/// Provider-side channel/instance identifier, wherever the provider puts it.
fn instance_hint(payload: &Value) -> Option<String> {
    if let Some(id) = first_str(
        payload,
        &["instanceId", "instance", "instance_id", "channelId", "session"],
    ) {
        return Some(id.to_string());
    }
    cloud_value(payload)
        .and_then(|v| v.get("metadata"))
        .and_then(|m| m.get("phone_number_id"))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// The explicit self-sent flag, when the provider sends one.
pub(crate) fn self_sent_flag(obj: &Value) -> Option<bool> {
    for path in ["fromMe", "isFromMe", "self", "key.fromMe"] {
        if let Some(v) = value_at(obj, path) {
            if let Some(b) = v.as_bool() {
                return Some(b);
            }
        }
    }
    None
}

/// Resolve the content kind by priority: explicit type -> MIME sniff ->
/// typed sub-object presence -> text.
fn infer_kind(msg: &Value, raw_kind: Option<&str>) -> MessageKind {
    if let Some(raw) = raw_kind {
        for token in kind_tokens(raw) {
            if let Some((_, kind)) = KIND_MAP.iter().find(|(k, _)| *k == token) {
                return *kind;
            }
        }
    }

    if let Some(mime) = first_str(
        msg,
        &["mimetype", "mimeType", "image.mimetype", "audio.mimetype",
          "video.mimetype", "document.mimetype", "media.mimetype"],
    ) {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            return MessageKind::Image;
        }
        if mime.starts_with("audio/") {
            return MessageKind::Audio;
        }
        if mime.starts_with("video/") {
            return MessageKind::Video;
        }
        if mime.starts_with("application/") {
            return MessageKind::Document;
        }
    }

    for (container, kind) in [
        ("image", MessageKind::Image),
        ("audio", MessageKind::Audio),
        ("video", MessageKind::Video),
        ("document", MessageKind::Document),
        ("location", MessageKind::Location),
    ] {
        if msg.get(container).is_some_and(Value::is_object) {
            return kind;
        }
    }

    MessageKind::Text
}

/// Call events require strong, multi-field evidence: an explicit call type
/// token, or a nested call object carrying call fields.
fn detect_call_event(msg: &Value, raw_kind: Option<&str>) -> bool {
    if let Some(raw) = raw_kind {
        if kind_tokens(raw).iter().any(|t| CALL_KINDS.contains(&t.as_str())) {
            return true;
        }
    }
    if let Some(call) = msg.get("call").filter(|c| c.is_object()) {
        return ["callId", "call_id", "offer", "isVideo"]
            .iter()
            .any(|key| call.get(*key).is_some());
    }
    false
}

fn extract_location(msg: &Value) -> Option<GeoPoint> {
    let obj = msg.get("location").filter(|l| l.is_object()).unwrap_or(msg);
    let latitude = first_f64(obj, &["latitude", "lat"])?;
    let longitude = first_f64(obj, &["longitude", "lng", "lon"])?;
    Some(GeoPoint { latitude, longitude })
}

/// Split a type/event value into comparable tokens (`message.sent` ->
/// `["message", "sent"]`).
fn kind_tokens(raw: &str) -> Vec<String> {
    raw.split(['.', ':', '/'])
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Walk a dot path into a JSON object.
fn value_at<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = obj;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// The first candidate path holding a non-empty string.
fn first_str<'a>(obj: &'a Value, paths: &[&str]) -> Option<&'a str> {
    for path in paths {
        if let Some(s) = value_at(obj, path).and_then(Value::as_str) {
            if !s.trim().is_empty() {
                return Some(s);
            }
        }
    }
    None
}

/// The first candidate path holding a number (or numeric string).
fn first_f64(obj: &Value, paths: &[&str]) -> Option<f64> {
    for path in paths {
        if let Some(v) = value_at(obj, path) {
            if let Some(n) = v.as_f64() {
                return Some(n);
            }
            if let Some(n) = v.as_str().and_then(|s| s.trim().parse::<f64>().ok()) {
                return Some(n);
            }
        }
    }
    None
}
