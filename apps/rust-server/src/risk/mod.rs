// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction risk analysis pipeline.
//!
//! ```text
//!               ┌─▶ ScamDetector ───────────┐
//! Transaction ──┼─▶ TransactionAnalyzer ────┼─▶ RiskAggregator ─▶ RiskAnalysis
//!               └─▶ AccountRiskEvaluator ───┘
//! ```

pub mod accounts;
pub mod aggregator;
pub mod analyzer;
pub mod error;
pub mod factor;
pub mod programs;
pub mod registry;
pub mod scam;
pub mod transaction;

pub use accounts::{AccountInfo, AccountResolver, AccountRiskEvaluator, StaticAccountResolver};
pub use aggregator::{RiskAggregator, RiskAnalysis, RiskDetails, RiskLevel};
pub use analyzer::{
    FeeEstimator, ProgramInteraction, SignatureFeeEstimator, TransactionAnalysisResult,
    TransactionAnalyzer, TransactionType,
};
pub use error::{AnalysisError, DetectorError, DetectorKind};
pub use factor::{RiskFactor, Severity};
pub use registry::{RegistryError, RegistryStats, ScamRegistry, ScamReport};
pub use scam::{ScamCheckResult, ScamDetector};
pub use transaction::{AccountMeta, Instruction, Transaction};
