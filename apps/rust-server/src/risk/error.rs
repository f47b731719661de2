// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Detector and aggregation errors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::registry::RegistryError;
use super::transaction::TransactionError;

/// The three detectors run by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    ScamDetector,
    TransactionAnalyzer,
    AccountEvaluator,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::ScamDetector => write!(f, "Scam detector"),
            DetectorKind::TransactionAnalyzer => write!(f, "Transaction analyzer"),
            DetectorKind::AccountEvaluator => write!(f, "Account evaluator"),
        }
    }
}

/// A detector could not finish its pass.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("malformed transaction: {0}")]
    Malformed(#[from] TransactionError),

    #[error("scam registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    #[error("account lookup failed for {account}: {reason}")]
    Resolver { account: String, reason: String },
}

/// The aggregator could not assess the transaction at all.
///
/// Distinct from a `high` risk result: the transaction was never scored.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("risk analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("risk analysis inconclusive, every detector failed: {}", .failures.join("; "))]
    Inconclusive { failures: Vec<String> },
}
