// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Byfrost platform.
//!
//! Routes: the per-instance webhook (`/webhook/{provider_id}`), the outbound
//! send API (`/v1/send`), the presence clock endpoints (`/v1/presence/*`),
//! and unauthenticated health. Every webhook invocation lands in the
//! diagnostic inbox regardless of outcome.

pub mod auth;
pub mod presence_api;
pub mod send;
pub mod server;
pub mod webhook;

pub use server::{build_router, start_server, GatewayState};
