// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Byfrost messaging platform.

use thiserror::Error;

/// The primary error type used across all Byfrost crates.
#[derive(Debug, Error)]
pub enum ByfrostError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Webhook transport errors (missing secret, unknown instance, malformed payload).
    #[error("webhook error: {message}")]
    Webhook {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Routing errors (no journey configured for a tenant, unknown journey key).
    #[error("routing error: {0}")]
    Routing(String),

    /// Expected, recoverable business-rule outcomes the caller must surface
    /// to a human (e.g. `already_exited`, `close_blocked`). The payload is a
    /// stable machine-readable reason code, never prose.
    #[error("rule violation: {0}")]
    Rule(String),

    /// Outbound delivery errors (provider API failure). Never fatal to the
    /// primary message write.
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ByfrostError {
    /// The stable reason code carried by a `Rule` error, if any.
    pub fn rule_code(&self) -> Option<&str> {
        match self {
            ByfrostError::Rule(code) => Some(code),
            _ => None,
        }
    }
}
