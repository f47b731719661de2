// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage
//!
//! The service keeps its working state in memory. The only thing written to
//! disk is the audit trail of gate decisions and registry changes.
//!
//! ## Layout
//!
//! ```text
//! {DATA_DIR}/
//!   audit/
//!     {date}/events.jsonl  # Daily audit logs
//! ```

pub mod audit;
pub mod paths;

use std::io;

pub use audit::{AuditEvent, AuditEventType, AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use paths::StoragePaths;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
