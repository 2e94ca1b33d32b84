// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Byfrost platform.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, typed query modules per entity,
//! and the atomic ingest/presence transactions that keep case creation,
//! message writes, pendencies, and job enqueues consistent under concurrent
//! webhook deliveries.

pub mod database;
pub mod ingest;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
