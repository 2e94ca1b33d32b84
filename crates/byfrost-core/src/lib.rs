// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Byfrost messaging platform.
//!
//! This crate provides the error taxonomy and the canonical domain types
//! shared by the ingestion pipeline, the journey/case engine, the presence
//! clock, and the gateway. It has no I/O of its own.

pub mod error;
pub mod types;

pub use error::ByfrostError;
pub use types::{
    CaseStatus, ContactRole, Direction, GeoPoint, InboxOutcome, MessageKind, NormalizedMessage,
    PresenceState, PunchKind, PunchSource,
};
