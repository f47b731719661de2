// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Risk factor vocabulary shared by every detector.
//!
//! A [`RiskFactor`] carries two numbers that mean different things:
//!
//! - `weight` feeds the scam detector's confidence (`sum(weights) / 100`).
//! - `severity` feeds the aggregate score through [`Severity::score_points`].

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Factor type identifiers emitted by the detectors.
pub mod kind {
    pub const KNOWN_SCAM_ADDRESS: &str = "known_scam_address";
    pub const SUSPICIOUS_PATTERN: &str = "suspicious_pattern";
    pub const MALICIOUS_PROGRAM: &str = "malicious_program";
    pub const UNVERIFIED_PROGRAM: &str = "unverified_program";
    pub const COMPLEX_TRANSACTION: &str = "complex_transaction";
    pub const MULTIPLE_TRANSFERS: &str = "multiple_transfers";
    pub const UNLIMITED_APPROVAL: &str = "unlimited_approval";
    pub const EXCESSIVE_ACCOUNT_ACCESS: &str = "excessive_account_access";
    pub const EXCESSIVE_WRITE_ACCESS: &str = "excessive_write_access";
    pub const HIGH_COMPLEXITY: &str = "high_complexity";
    pub const LARGE_INSTRUCTION_DATA: &str = "large_instruction_data";
    pub const UNKNOWN_ACCOUNT: &str = "unknown_account";
    pub const ANALYSIS_ERROR: &str = "analysis_error";
}

/// Weight attached to the `analysis_error` sentinel factor.
pub const ANALYSIS_ERROR_WEIGHT: u32 = 5;

/// Severity bucket of a finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Points subtracted from the 100-point score budget.
    pub fn score_points(self) -> u32 {
        match self {
            Severity::High => 30,
            Severity::Medium => 15,
            Severity::Low => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected issue.
///
/// Fields are private so a factor cannot be altered once a detector has
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RiskFactor {
    /// Factor type, one of the [`kind`] constants.
    #[serde(rename = "type")]
    kind: String,
    severity: Severity,
    description: String,
    /// Contribution to scam confidence (0-100 budget).
    weight: u32,
}

impl RiskFactor {
    pub fn new(
        kind: impl Into<String>,
        severity: Severity,
        weight: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            severity,
            description: description.into(),
            weight,
        }
    }

    /// Sentinel factor recorded when a detector could not finish.
    pub fn analysis_error(source: impl fmt::Display, error: impl fmt::Display) -> Self {
        Self::new(
            kind::ANALYSIS_ERROR,
            Severity::Low,
            ANALYSIS_ERROR_WEIGHT,
            format!("{source} could not complete: {error}"),
        )
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Sum of the `weight` fields of a set of factors.
pub fn total_weight<'a>(factors: impl IntoIterator<Item = &'a RiskFactor>) -> u32 {
    factors.into_iter().map(RiskFactor::weight).sum()
}
