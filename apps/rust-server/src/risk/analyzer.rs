// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structural transaction analyzer.
//!
//! Classifies the transaction, records one [`ProgramInteraction`] per
//! instruction, estimates fees and (for swaps) slippage, and flags
//! structural anomalies such as excessive account access.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{DetectorError, DetectorKind};
use super::factor::{kind, RiskFactor, Severity};
use super::programs;
use super::transaction::{Transaction, LAMPORTS_PER_SOL};

/// Fee used when the estimator fails, in SOL.
pub const DEFAULT_FALLBACK_FEE_SOL: f64 = 0.000_005;

/// Base fee charged per signature, in lamports.
pub const DEFAULT_LAMPORTS_PER_SIGNATURE: u64 = 5_000;

const MAX_DISTINCT_ACCOUNTS: usize = 20;
const MAX_PRIVILEGED_ACCOUNTS: usize = 10;
const HIGH_COMPLEXITY_INSTRUCTIONS: usize = 15;
const LARGE_INSTRUCTION_DATA_BYTES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    TokenTransfer,
    Swap,
    Stake,
    Unknown,
}

/// One instruction's program, as the analyzer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgramInteraction {
    pub program_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    pub is_verified: bool,
    pub risk_level: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransactionAnalysisResult {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Estimated network fee in SOL.
    pub estimated_fees: f64,
    /// Expected slippage in percent. Only set for swaps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage: Option<f64>,
    pub risks: Vec<RiskFactor>,
    pub program_interactions: Vec<ProgramInteraction>,
}

impl TransactionAnalysisResult {
    /// Result recorded when the analysis itself failed.
    pub fn fallback(fee: f64, error: &DetectorError) -> Self {
        Self {
            transaction_type: TransactionType::Unknown,
            estimated_fees: fee,
            slippage: None,
            risks: vec![RiskFactor::analysis_error(
                DetectorKind::TransactionAnalyzer,
                error,
            )],
            program_interactions: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeeError {
    #[error("fee estimate unavailable: {0}")]
    Unavailable(String),
}

/// Source of network fee estimates.
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    /// Estimated fee for `tx` in SOL.
    async fn estimate_fee(&self, tx: &Transaction) -> Result<f64, FeeError>;
}

/// Offline estimator: base fee per distinct signer.
#[derive(Debug, Clone, Copy)]
pub struct SignatureFeeEstimator {
    lamports_per_signature: u64,
}

impl SignatureFeeEstimator {
    pub fn new(lamports_per_signature: u64) -> Self {
        Self {
            lamports_per_signature,
        }
    }
}

impl Default for SignatureFeeEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_LAMPORTS_PER_SIGNATURE)
    }
}

#[async_trait]
impl FeeEstimator for SignatureFeeEstimator {
    async fn estimate_fee(&self, tx: &Transaction) -> Result<f64, FeeError> {
        let signers = u64::try_from(tx.signer_count())
            .map_err(|_| FeeError::Unavailable("signer count overflow".into()))?;
        let lamports = signers
            .checked_mul(self.lamports_per_signature)
            .ok_or_else(|| FeeError::Unavailable("fee overflow".into()))?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL as f64)
    }
}

/// Classify by the first matching rule: native transfer, token transfer,
/// two or more token-program instructions (swap), stake program, unknown.
pub fn classify(tx: &Transaction) -> TransactionType {
    let ixs = &tx.instructions;
    if ixs.iter().any(|ix| ix.is_native_transfer()) {
        TransactionType::Transfer
    } else if ixs.iter().any(|ix| ix.is_token_transfer()) {
        TransactionType::TokenTransfer
    } else if ixs.iter().filter(|ix| ix.is_token_program()).count() >= 2 {
        TransactionType::Swap
    } else if ixs.iter().any(|ix| ix.is_stake()) {
        TransactionType::Stake
    } else {
        TransactionType::Unknown
    }
}

/// Slippage heuristic in percent, stepped on instruction count.
///
/// Not a price-impact model; longer routes just get a wider tolerance.
pub fn estimate_slippage(instruction_count: usize) -> f64 {
    match instruction_count {
        0..=2 => 0.5,
        3..=4 => 1.0,
        5..=8 => 2.0,
        _ => 5.0,
    }
}

fn interaction(program_id: &str) -> ProgramInteraction {
    match programs::lookup(program_id) {
        Some(known) => ProgramInteraction {
            program_id: program_id.to_string(),
            program_name: Some(known.name.to_string()),
            is_verified: known.verified,
            risk_level: known.baseline,
            description: known.description.to_string(),
        },
        None => ProgramInteraction {
            program_id: program_id.to_string(),
            program_name: None,
            is_verified: false,
            risk_level: Severity::Medium,
            description: "Unregistered program".to_string(),
        },
    }
}

pub struct TransactionAnalyzer {
    fees: Arc<dyn FeeEstimator>,
    fallback_fee: f64,
}

impl TransactionAnalyzer {
    pub fn new(fees: Arc<dyn FeeEstimator>) -> Self {
        Self {
            fees,
            fallback_fee: DEFAULT_FALLBACK_FEE_SOL,
        }
    }

    pub fn with_fallback_fee(mut self, fee: f64) -> Self {
        self.fallback_fee = fee;
        self
    }

    pub fn fallback_fee(&self) -> f64 {
        self.fallback_fee
    }

    /// Analyze a transaction. Never fails: an internal error yields an
    /// `unknown` result carrying a single `analysis_error` factor.
    pub async fn analyze_transaction(&self, tx: &Transaction) -> TransactionAnalysisResult {
        match self.try_analyze(tx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Structural analysis failed");
                TransactionAnalysisResult::fallback(self.fallback_fee, &e)
            }
        }
    }

    pub async fn try_analyze(
        &self,
        tx: &Transaction,
    ) -> Result<TransactionAnalysisResult, DetectorError> {
        tx.validate()?;

        let transaction_type = classify(tx);
        let mut risks = Vec::new();

        let program_interactions: Vec<ProgramInteraction> = tx
            .instructions
            .iter()
            .map(|ix| interaction(&ix.program_id))
            .collect();
        for unverified in program_interactions.iter().filter(|p| !p.is_verified) {
            risks.push(RiskFactor::new(
                kind::UNVERIFIED_PROGRAM,
                Severity::Medium,
                20,
                format!("Interaction with unverified program {}", unverified.program_id),
            ));
        }

        let accounts = tx.accounts();
        if accounts.len() > MAX_DISTINCT_ACCOUNTS {
            risks.push(RiskFactor::new(
                kind::EXCESSIVE_ACCOUNT_ACCESS,
                Severity::Medium,
                15,
                format!("Transaction accesses {} distinct accounts", accounts.len()),
            ));
        }
        let privileged = accounts.iter().filter(|a| a.is_privileged()).count();
        if privileged > MAX_PRIVILEGED_ACCOUNTS {
            risks.push(RiskFactor::new(
                kind::EXCESSIVE_WRITE_ACCESS,
                Severity::High,
                25,
                format!("Transaction requests signer or write access to {privileged} accounts"),
            ));
        }

        let count = tx.instruction_count();
        if count > HIGH_COMPLEXITY_INSTRUCTIONS {
            risks.push(RiskFactor::new(
                kind::HIGH_COMPLEXITY,
                Severity::Medium,
                20,
                format!("Transaction has {count} instructions"),
            ));
        }
        if let [only] = tx.instructions.as_slice() {
            if only.data.len() > LARGE_INSTRUCTION_DATA_BYTES {
                risks.push(RiskFactor::new(
                    kind::LARGE_INSTRUCTION_DATA,
                    Severity::Medium,
                    15,
                    format!("Single instruction carries {} bytes of data", only.data.len()),
                ));
            }
        }

        let estimated_fees = match self.fees.estimate_fee(tx).await {
            Ok(fee) if fee.is_finite() && fee >= 0.0 => fee,
            Ok(fee) => {
                tracing::warn!(fee, "Fee estimator returned an invalid fee, using fallback");
                self.fallback_fee
            }
            Err(e) => {
                tracing::warn!(error = %e, "Fee estimation failed, using fallback");
                self.fallback_fee
            }
        };

        let slippage =
            (transaction_type == TransactionType::Swap).then(|| estimate_slippage(count));

        Ok(TransactionAnalysisResult {
            transaction_type,
            estimated_fees,
            slippage,
            risks,
            program_interactions,
        })
    }
}
