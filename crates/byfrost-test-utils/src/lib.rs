// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider payload fixtures for tests.
//!
//! Builders for the webhook payload shapes the ingestion pipeline must
//! normalize: the Meta Cloud API's deeply nested envelope, the flat
//! gateway-provider shape (Z-API/Evolution style), and provider callbacks
//! that are not user content (receipts, call events).

pub mod payloads;

pub use payloads::*;
