// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence clock engine for the Byfrost platform.
//!
//! Geofenced, schedule-aware employee time attendance: haversine geofence
//! evaluation ([`geofence`]), DST-correct tenant-local schedule math
//! ([`schedule`]), and the punch/justify/close state machine
//! ([`clock::PresenceClock`]) on top of the atomic storage transactions.

pub mod clock;
pub mod geofence;
pub mod schedule;

pub use clock::{PresenceClock, PresencePolicy};
pub use geofence::{haversine_distance_m, GeofencePolicy};
pub use schedule::{lateness_minutes, DstWindow, ZoneRule};
