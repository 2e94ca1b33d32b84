// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Journey routing and the case state engine.
//!
//! [`JourneyRouter`] picks exactly one workflow for a (tenant, instance,
//! sender) combination; [`CaseEngine`] turns a normalized message into the
//! atomic plan that `byfrost-storage` applies. Tenant automation toggles
//! live in [`config::TenantJourneyConfig`].

pub mod config;
pub mod engine;
pub mod router;

pub use config::TenantJourneyConfig;
pub use engine::CaseEngine;
pub use router::{JourneyRouter, RouteDecision};
