// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scam and heuristic pattern detector.
//!
//! Checks every identifier a transaction touches against the scam registry,
//! flags malicious or unverified programs, and looks for drain-style
//! structure (many transfers, unlimited approvals).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{DetectorError, DetectorKind};
use super::factor::{kind, total_weight, RiskFactor, Severity};
use super::programs;
use super::registry::ScamRegistry;
use super::transaction::Transaction;

/// More instructions than this is a complex transaction.
const COMPLEX_INSTRUCTION_LIMIT: usize = 10;

/// More transfer-shaped instructions than this looks like a wallet drain.
const TRANSFER_DRAIN_LIMIT: usize = 5;

/// Confidence above which a transaction is labelled a scam.
pub const SCAM_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Result of a scam check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScamCheckResult {
    pub is_scam: bool,
    /// `min(sum(weights) / 100, 1)`.
    pub confidence: f64,
    pub risks: Vec<RiskFactor>,
    pub known_scam_addresses: Vec<String>,
    pub suspicious_patterns: Vec<String>,
}

impl ScamCheckResult {
    fn from_risks(
        risks: Vec<RiskFactor>,
        known_scam_addresses: Vec<String>,
        suspicious_patterns: Vec<String>,
    ) -> Self {
        let confidence = (f64::from(total_weight(&risks)) / 100.0).min(1.0);
        Self {
            is_scam: confidence > SCAM_CONFIDENCE_THRESHOLD,
            confidence,
            risks,
            known_scam_addresses,
            suspicious_patterns,
        }
    }

    /// Result recorded when the check itself failed.
    pub fn from_failure(error: &DetectorError) -> Self {
        Self::from_risks(
            vec![RiskFactor::analysis_error(DetectorKind::ScamDetector, error)],
            Vec::new(),
            Vec::new(),
        )
    }
}

/// Detector backed by the shared [`ScamRegistry`].
#[derive(Debug, Clone)]
pub struct ScamDetector {
    registry: Arc<ScamRegistry>,
}

impl ScamDetector {
    pub fn new(registry: Arc<ScamRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ScamRegistry> {
        &self.registry
    }

    /// Check a transaction. Never fails: an internal error becomes a single
    /// `analysis_error` factor.
    pub fn check_transaction(&self, tx: &Transaction) -> ScamCheckResult {
        self.try_check(tx).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Scam check failed");
            ScamCheckResult::from_failure(&e)
        })
    }

    pub fn try_check(&self, tx: &Transaction) -> Result<ScamCheckResult, DetectorError> {
        tx.validate()?;
        let db = self.registry.snapshot()?;

        let mut risks = Vec::new();
        let mut known_scam_addresses = Vec::new();
        let mut suspicious_patterns: Vec<String> = Vec::new();

        for id in tx.referenced_ids() {
            if db.is_known_scam(id) {
                risks.push(RiskFactor::new(
                    kind::KNOWN_SCAM_ADDRESS,
                    Severity::High,
                    50,
                    format!("Interaction with known scam address {id}"),
                ));
                known_scam_addresses.push(id.to_string());
            }

            for pattern in db.patterns().iter().filter(|p| p.is_match(id)) {
                risks.push(RiskFactor::new(
                    kind::SUSPICIOUS_PATTERN,
                    Severity::Medium,
                    25,
                    format!("Address {id} matches suspicious pattern {}", pattern.as_str()),
                ));
                if !suspicious_patterns.iter().any(|p| p == pattern.as_str()) {
                    suspicious_patterns.push(pattern.as_str().to_string());
                }
            }
        }

        for ix in &tx.instructions {
            if db.is_malicious_program(&ix.program_id) {
                risks.push(RiskFactor::new(
                    kind::MALICIOUS_PROGRAM,
                    Severity::High,
                    40,
                    format!("Instruction calls known malicious program {}", ix.program_id),
                ));
            }
            if !programs::is_verified(&ix.program_id) {
                risks.push(RiskFactor::new(
                    kind::UNVERIFIED_PROGRAM,
                    Severity::Medium,
                    20,
                    format!("Instruction calls unverified program {}", ix.program_id),
                ));
            }
        }

        let count = tx.instruction_count();
        if count > COMPLEX_INSTRUCTION_LIMIT {
            risks.push(RiskFactor::new(
                kind::COMPLEX_TRANSACTION,
                Severity::Medium,
                15,
                format!("Transaction contains {count} instructions"),
            ));
        }

        let transfers = tx
            .instructions
            .iter()
            .filter(|ix| ix.is_transfer_shaped())
            .count();
        if transfers > TRANSFER_DRAIN_LIMIT {
            risks.push(RiskFactor::new(
                kind::MULTIPLE_TRANSFERS,
                Severity::High,
                35,
                format!("{transfers} transfer instructions in one transaction (possible wallet drain)"),
            ));
        }

        if tx.instructions.iter().any(|ix| ix.has_unlimited_amount()) {
            risks.push(RiskFactor::new(
                kind::UNLIMITED_APPROVAL,
                Severity::High,
                45,
                "Instruction grants an unlimited token approval",
            ));
        }

        Ok(ScamCheckResult::from_risks(
            risks,
            known_scam_addresses,
            suspicious_patterns,
        ))
    }
}
