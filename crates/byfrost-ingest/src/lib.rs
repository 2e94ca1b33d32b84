// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook payload ingestion for the Byfrost platform.
//!
//! The pipeline's front half: provider payload normalization
//! ([`normalize::normalize`]), phone normalization with Brazilian
//! mobile-digit variants ([`phone`]), direction resolution
//! ([`direction::resolve_direction`]), and sender identity resolution
//! ([`identity::resolve_sender`]). Each piece has a narrow contract and is
//! independently testable; the gateway composes them.

pub mod direction;
pub mod identity;
pub mod normalize;
pub mod phone;

pub use direction::resolve_direction;
pub use identity::{resolve_sender, SenderIdentity};
pub use normalize::normalize;
pub use phone::{br_variants, is_group_endpoint, normalize_phone};
