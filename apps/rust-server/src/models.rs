// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Domain results
//! ([`RiskAnalysis`](crate::risk::RiskAnalysis),
//! [`GateDecision`](crate::security::GateDecision), ...) are returned as-is;
//! this module only holds the envelopes around them.
//!
//! ## Model Categories
//!
//! - **Analysis**: transactions submitted for scoring or gating
//! - **OTP**: code delivery and verification
//! - **Time locks**: release results
//! - **Scams**: reports and denylist updates

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::risk::Transaction;
use crate::security::{SecurityOptions, TimeLockEntry};

// =============================================================================
// Analysis Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AnalyzeRequest {
    pub transaction: Transaction,
}

/// A transaction to run through the security gate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SecureRequest {
    pub transaction: Transaction,
    /// Gate options. Omitted fields take their defaults (simulation on,
    /// every other factor off).
    #[serde(default)]
    pub options: SecurityOptions,
}

// =============================================================================
// OTP Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OtpSentResponse {
    pub sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OtpVerifiedResponse {
    pub verified: bool,
}

// =============================================================================
// Time-lock Models
// =============================================================================

/// A released transaction, handed back for signing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ReleaseResponse {
    pub time_lock: TimeLockEntry,
    pub transaction: Transaction,
}

// =============================================================================
// Scam Registry Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ReportScamRequest {
    pub address: String,
    /// Free-form evidence (URL, description, transaction signature).
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UpdateScamDatabaseRequest {
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Regular expressions matched against every referenced account.
    #[serde(default)]
    pub patterns: Vec<String>,
}
