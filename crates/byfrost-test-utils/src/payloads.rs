// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload builders, one family per provider shape.

use serde_json::{json, Value};

/// Meta Cloud API text message: the deeply nested `entry/changes/value`
/// envelope.
pub fn cloud_text(phone_number_id: &str, from: &str, wamid: &str, body: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "wba-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "551140040000",
                        "phone_number_id": phone_number_id,
                    },
                    "messages": [{
                        "from": from,
                        "id": wamid,
                        "timestamp": "1754550000",
                        "type": "text",
                        "text": { "body": body },
                    }],
                },
            }],
        }],
    })
}

/// Meta Cloud API delivery/read receipt (a `statuses` callback, no message).
pub fn cloud_status(phone_number_id: &str, wamid: &str, status: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "wba-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": { "phone_number_id": phone_number_id },
                    "statuses": [{
                        "id": wamid,
                        "status": status,
                        "timestamp": "1754550000",
                        "recipient_id": "5511999990000",
                    }],
                },
            }],
        }],
    })
}

/// Flat gateway-provider text message (Z-API/Evolution style).
pub fn flat_text(instance_id: &str, from: &str, message_id: &str, body: &str) -> Value {
    json!({
        "instanceId": instance_id,
        "messageId": message_id,
        "phone": from,
        "fromMe": false,
        "momment": 1754550000000i64,
        "senderName": "Fixture Sender",
        "text": { "message": body },
    })
}

/// Flat gateway-provider image message with caption and MIME type.
pub fn flat_image(instance_id: &str, from: &str, message_id: &str, caption: &str) -> Value {
    json!({
        "instanceId": instance_id,
        "messageId": message_id,
        "phone": from,
        "fromMe": false,
        "image": {
            "imageUrl": "https://media.example.com/img-1.jpg",
            "mimetype": "image/jpeg",
            "caption": caption,
        },
    })
}

/// Flat gateway-provider location message.
pub fn flat_location(instance_id: &str, from: &str, message_id: &str, lat: f64, lon: f64) -> Value {
    json!({
        "instanceId": instance_id,
        "messageId": message_id,
        "phone": from,
        "fromMe": false,
        "location": {
            "latitude": lat,
            "longitude": lon,
            "address": "Av. Paulista, 1000",
        },
    })
}

/// Flat self-sent message (`fromMe: true`), as captured by providers that
/// echo the instance's own sends back into the webhook.
pub fn flat_from_me(instance_id: &str, to: &str, message_id: &str, body: &str) -> Value {
    json!({
        "instanceId": instance_id,
        "messageId": message_id,
        "phone": to,
        "fromMe": true,
        "text": { "message": body },
    })
}

/// Flat group message: the chat id is a group jid, not a phone.
pub fn flat_group_text(instance_id: &str, group_jid: &str, message_id: &str, body: &str) -> Value {
    json!({
        "instanceId": instance_id,
        "messageId": message_id,
        "phone": group_jid,
        "isGroup": true,
        "participantPhone": "5511999990000",
        "fromMe": false,
        "text": { "message": body },
    })
}

/// A genuine call event: explicit type plus a nested call object.
pub fn flat_call_event(instance_id: &str, from: &str, call_id: &str) -> Value {
    json!({
        "instanceId": instance_id,
        "type": "call",
        "phone": from,
        "fromMe": false,
        "call": {
            "callId": call_id,
            "offer": true,
            "isVideo": false,
        },
    })
}

/// A text message whose body merely contains the word "callback"; must never
/// classify as a call event.
pub fn flat_callback_text(instance_id: &str, from: &str, message_id: &str) -> Value {
    flat_text(
        instance_id,
        from,
        message_id,
        "please schedule a callback tomorrow",
    )
}

/// Generic event-envelope shape (`event` + `data`) some providers use.
pub fn enveloped_text(instance_id: &str, from: &str, message_id: &str, body: &str) -> Value {
    json!({
        "event": "message.received",
        "instance": instance_id,
        "data": {
            "id": message_id,
            "from": from,
            "type": "text",
            "body": body,
        },
    })
}

/// Generic event-envelope outbound echo (`message.sent`).
pub fn enveloped_sent(instance_id: &str, to: &str, message_id: &str, body: &str) -> Value {
    json!({
        "event": "message.sent",
        "instance": instance_id,
        "data": {
            "id": message_id,
            "to": to,
            "type": "text",
            "body": body,
        },
    })
}
