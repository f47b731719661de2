// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GuardianLayer - Transaction Risk Analysis & Security Gate
//!
//! Scores Solana-style transactions for scam and structural risk, then
//! gates them behind optional biometric, PIN, email OTP and time-lock
//! checks before they are handed back for signing.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `risk` - Detectors and the risk aggregator
//! - `security` - Security gate, OTP service, time locks
//! - `storage` - Audit log (daily JSONL files)

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod risk;
pub mod security;
pub mod state;
pub mod storage;
