// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical domain types shared across the Byfrost workspace.
//!
//! Enum string forms are what gets persisted; they are stable and must not
//! change without a migration.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Message direction relative to the tenant's channel instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Canonical message content kind after payload normalization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Location,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// Role of a phone-keyed contact within a tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContactRole {
    Vendor,
    Employee,
    Customer,
}

/// Lifecycle status of a case.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Open,
    Closed,
}

/// States of the presence (time attendance) state machine.
///
/// `PendenteJustificativa` is orthogonal: reachable from most states when a
/// rule-violation pendency is created. `Fechado` is terminal and set only by
/// the explicit day-close operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum PresenceState {
    #[strum(serialize = "AGUARDANDO_ENTRADA")]
    #[serde(rename = "AGUARDANDO_ENTRADA")]
    AguardandoEntrada,
    #[strum(serialize = "EM_EXPEDIENTE")]
    #[serde(rename = "EM_EXPEDIENTE")]
    EmExpediente,
    #[strum(serialize = "EM_INTERVALO")]
    #[serde(rename = "EM_INTERVALO")]
    EmIntervalo,
    #[strum(serialize = "AGUARDANDO_SAIDA")]
    #[serde(rename = "AGUARDANDO_SAIDA")]
    AguardandoSaida,
    #[strum(serialize = "PENDENTE_JUSTIFICATIVA")]
    #[serde(rename = "PENDENTE_JUSTIFICATIVA")]
    PendenteJustificativa,
    #[strum(serialize = "PENDENTE_APROVACAO")]
    #[serde(rename = "PENDENTE_APROVACAO")]
    PendenteAprovacao,
    #[strum(serialize = "FECHADO")]
    #[serde(rename = "FECHADO")]
    Fechado,
}

/// Attendance punch kinds, in their strict daily sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum PunchKind {
    #[strum(serialize = "ENTRY")]
    #[serde(rename = "ENTRY")]
    Entry,
    #[strum(serialize = "BREAK_START")]
    #[serde(rename = "BREAK_START")]
    BreakStart,
    #[strum(serialize = "BREAK_END")]
    #[serde(rename = "BREAK_END")]
    BreakEnd,
    #[strum(serialize = "EXIT")]
    #[serde(rename = "EXIT")]
    Exit,
}

impl PunchKind {
    /// The next punch in the daily sequence, or `None` after EXIT.
    pub fn next(self) -> Option<PunchKind> {
        match self {
            PunchKind::Entry => Some(PunchKind::BreakStart),
            PunchKind::BreakStart => Some(PunchKind::BreakEnd),
            PunchKind::BreakEnd => Some(PunchKind::Exit),
            PunchKind::Exit => None,
        }
    }
}

/// Where a punch submission originated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PunchSource {
    App,
    Channel,
}

/// Outcome flag recorded in the diagnostic inbox for every webhook call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InboxOutcome {
    Processed,
    Duplicate,
    Ignored,
    Unauthorized,
    Error,
}

/// A geographic coordinate pair (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Canonical record produced by the payload normalizer.
///
/// Every field degrades to `None`/`false` when the provider payload lacks or
/// garbles it; normalization never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Provider-side channel/instance identifier, when the payload carries one.
    pub instance_hint: Option<String>,
    /// Resolved content kind (defaults to text).
    #[serde(default)]
    pub kind: MessageKind,
    /// Normalized sender endpoint (`+<cc><digits>` or an opaque group id).
    pub from: Option<String>,
    /// Normalized recipient endpoint.
    pub to: Option<String>,
    /// Body text or caption.
    pub text: Option<String>,
    /// Media URL for image/audio/video/document kinds.
    pub media_url: Option<String>,
    /// Structured location for location kinds.
    pub location: Option<GeoPoint>,
    /// Provider message id, used for deduplication when present.
    pub external_id: Option<String>,
    /// True only on strong multi-field evidence of a voice/video call event.
    pub is_call_event: bool,
    /// Delivery/read receipts and presence pings: acknowledge silently.
    pub is_receipt: bool,
    /// The raw provider type/event string, preserved for diagnostics.
    pub raw_kind: Option<String>,
}
