// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-local schedule math: zone offsets, DST correction, and lateness.
//!
//! Zones are configured as a standard UTC offset plus an optional DST window
//! (month-day bounds in local calendar, with its own offset). Converting a
//! local wall time to an instant uses a two-pass correction: compute a naive
//! UTC guess with the standard offset, measure the actual zone offset at
//! that instant, and re-apply it. A single pass misassigns wall times on
//! days where the offset differs from standard.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A DST window in local month-day terms. `start` is inclusive, `end`
/// exclusive; a window may wrap the year end (southern hemisphere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstWindow {
    pub offset_minutes: i32,
    pub start: (u32, u32),
    pub end: (u32, u32),
}

/// A tenant zone rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRule {
    pub standard_offset_minutes: i32,
    pub dst: Option<DstWindow>,
}

impl ZoneRule {
    /// Fixed offset, no DST.
    pub fn fixed(standard_offset_minutes: i32) -> Self {
        Self {
            standard_offset_minutes,
            dst: None,
        }
    }

    /// The zone's UTC offset, in minutes, at the given instant.
    pub fn offset_at(&self, instant: DateTime<Utc>) -> i32 {
        let Some(dst) = self.dst else {
            return self.standard_offset_minutes;
        };
        // The window is defined in local calendar terms; the standard offset
        // is close enough to pick the local date.
        let local = instant + Duration::minutes(self.standard_offset_minutes as i64);
        let md = (local.month(), local.day());
        if in_window(md, dst.start, dst.end) {
            dst.offset_minutes
        } else {
            self.standard_offset_minutes
        }
    }

    /// The local calendar date at the given instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        let offset = self.offset_at(instant);
        (instant + Duration::minutes(offset as i64)).date_naive()
    }

    /// Convert a local wall time on a local date to a UTC instant, with the
    /// two-pass DST correction.
    pub fn wall_time_to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        // Pass 1: naive guess with the standard offset.
        let guess = Utc.from_utc_datetime(
            &(local - Duration::minutes(self.standard_offset_minutes as i64)),
        );
        // Pass 2: measure the real offset at that instant and re-apply.
        let actual = self.offset_at(guess);
        Utc.from_utc_datetime(&(local - Duration::minutes(actual as i64)))
    }
}

/// Month-day containment, `start` inclusive, `end` exclusive, wrapping the
/// year end when `start > end`.
fn in_window(md: (u32, u32), start: (u32, u32), end: (u32, u32)) -> bool {
    if start <= end {
        md >= start && md < end
    } else {
        md >= start || md < end
    }
}

/// Minutes an ENTRY punch arrived past the scheduled start, when it exceeds
/// the tolerance. `None` means on time (within tolerance).
pub fn lateness_minutes(
    punch: DateTime<Utc>,
    scheduled_start: NaiveTime,
    tolerance_minutes: i64,
    zone: &ZoneRule,
) -> Option<i64> {
    let date = zone.local_date(punch);
    let scheduled = zone.wall_time_to_utc(date, scheduled_start);
    let late_by = (punch - scheduled).num_minutes();
    (late_by > tolerance_minutes).then_some(late_by)
}
