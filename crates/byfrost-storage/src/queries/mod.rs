// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity.

pub mod cases;
pub mod contacts;
pub mod inbox;
pub mod instances;
pub mod jobs;
pub mod journeys;
pub mod messages;
pub mod pendencies;
pub mod presence;
pub mod timeline;
