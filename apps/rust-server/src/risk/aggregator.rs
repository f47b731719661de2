// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Risk aggregation.
//!
//! Runs the scam detector, the structural analyzer and the account
//! evaluator concurrently, merges their findings in that order and turns
//! them into a score, a level and a recommendation.
//!
//! ## Scoring
//!
//! | Findings | Score |
//! |----------|-------|
//! | none | 95 |
//! | any | `max(0, 100 - sum(severity points))` |
//!
//! Levels: `>= 80` safe, `50..80` medium, `< 50` high.
//!
//! A detector that fails contributes one `analysis_error` factor and is
//! listed in [`RiskDetails::degraded`]. If all three fail the analysis is
//! inconclusive and no score is produced.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::accounts::AccountRiskEvaluator;
use super::analyzer::{TransactionAnalysisResult, TransactionAnalyzer};
use super::error::{AnalysisError, DetectorKind};
use super::factor::{RiskFactor, Severity};
use super::scam::{ScamCheckResult, ScamDetector};
use super::transaction::Transaction;

/// Score of a transaction with no findings.
pub const EMPTY_RISK_SCORE: u8 = 95;

/// Lowest score that is still `safe`.
pub const SAFE_THRESHOLD: u8 = 80;

/// Lowest score that is still `medium`.
pub const MEDIUM_THRESHOLD: u8 = 50;

pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= SAFE_THRESHOLD {
            RiskLevel::Safe
        } else if score >= MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score in `[0, 100]` for a set of factors.
pub fn compute_score(factors: &[RiskFactor]) -> u8 {
    if factors.is_empty() {
        return EMPTY_RISK_SCORE;
    }
    let points: u32 = factors.iter().map(|f| f.severity().score_points()).sum();
    // Bounded by 100, so the narrowing cannot truncate.
    100u32.saturating_sub(points) as u8
}

/// Human-readable advice derived from the level and factor counts.
pub fn recommendation(level: RiskLevel, factors: &[RiskFactor]) -> String {
    let total = factors.len();
    match level {
        RiskLevel::Safe if total == 0 => "Transaction appears safe to sign.".to_string(),
        RiskLevel::Safe => format!(
            "Transaction appears safe. Review {total} minor finding(s) before signing."
        ),
        RiskLevel::Medium => format!(
            "Proceed with caution: {total} risk factor(s) detected. Review the details before signing."
        ),
        RiskLevel::High => {
            let high = factors
                .iter()
                .filter(|f| f.severity() == Severity::High)
                .count();
            format!(
                "Do not sign this transaction: {high} high-severity risk factor(s) detected out of {total}."
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskDetails {
    pub scam_check: ScamCheckResult,
    pub transaction_analysis: TransactionAnalysisResult,
    pub account_risks: Vec<RiskFactor>,
    /// Detectors whose failure was folded into an `analysis_error` factor.
    #[serde(default)]
    pub degraded: Vec<DetectorKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskAnalysis {
    pub level: RiskLevel,
    pub score: u8,
    /// One entry per factor, in detector order.
    pub reasons: Vec<String>,
    pub recommendation: String,
    pub details: RiskDetails,
}

impl RiskAnalysis {
    /// Every factor in scam, structural, account order.
    pub fn factors(&self) -> impl Iterator<Item = &RiskFactor> {
        self.details
            .scam_check
            .risks
            .iter()
            .chain(self.details.transaction_analysis.risks.iter())
            .chain(self.details.account_risks.iter())
    }
}

pub struct RiskAggregator {
    scam: ScamDetector,
    analyzer: TransactionAnalyzer,
    accounts: AccountRiskEvaluator,
    timeout: Duration,
}

impl RiskAggregator {
    pub fn new(
        scam: ScamDetector,
        analyzer: TransactionAnalyzer,
        accounts: AccountRiskEvaluator,
    ) -> Self {
        Self {
            scam,
            analyzer,
            accounts,
            timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn scam_detector(&self) -> &ScamDetector {
        &self.scam
    }

    pub async fn analyze(&self, tx: &Transaction) -> Result<RiskAnalysis, AnalysisError> {
        self.simulate_and_check(tx).await
    }

    /// Run all three detectors and aggregate their findings.
    pub async fn simulate_and_check(&self, tx: &Transaction) -> Result<RiskAnalysis, AnalysisError> {
        let accounts = tx.accounts();
        let joined = tokio::time::timeout(self.timeout, async {
            let scam = async { self.scam.try_check(tx) };
            tokio::join!(
                scam,
                self.analyzer.try_analyze(tx),
                self.accounts.analyze_accounts(&accounts)
            )
        })
        .await;

        let (scam, structural, account) = match joined {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Risk analysis timed out");
                return Err(AnalysisError::Timeout(self.timeout));
            }
        };

        let mut degraded = Vec::new();
        let mut failures = Vec::new();

        let scam_check = scam.unwrap_or_else(|e| {
            tracing::warn!(detector = %DetectorKind::ScamDetector, error = %e, "Detector failed");
            degraded.push(DetectorKind::ScamDetector);
            failures.push(format!("{}: {e}", DetectorKind::ScamDetector));
            ScamCheckResult::from_failure(&e)
        });

        let transaction_analysis = structural.unwrap_or_else(|e| {
            tracing::warn!(detector = %DetectorKind::TransactionAnalyzer, error = %e, "Detector failed");
            degraded.push(DetectorKind::TransactionAnalyzer);
            failures.push(format!("{}: {e}", DetectorKind::TransactionAnalyzer));
            TransactionAnalysisResult::fallback(self.analyzer.fallback_fee(), &e)
        });

        let account_risks = account.unwrap_or_else(|e| {
            tracing::warn!(detector = %DetectorKind::AccountEvaluator, error = %e, "Detector failed");
            degraded.push(DetectorKind::AccountEvaluator);
            failures.push(format!("{}: {e}", DetectorKind::AccountEvaluator));
            vec![RiskFactor::analysis_error(DetectorKind::AccountEvaluator, &e)]
        });

        if degraded.len() == 3 {
            tracing::error!(failures = ?failures, "Every risk detector failed");
            return Err(AnalysisError::Inconclusive { failures });
        }

        let details = RiskDetails {
            scam_check,
            transaction_analysis,
            account_risks,
            degraded,
        };
        let factors: Vec<RiskFactor> = details
            .scam_check
            .risks
            .iter()
            .chain(details.transaction_analysis.risks.iter())
            .chain(details.account_risks.iter())
            .cloned()
            .collect();

        let score = compute_score(&factors);
        let level = RiskLevel::from_score(score);
        let reasons = factors.iter().map(|f| f.description().to_string()).collect();
        let recommendation = recommendation(level, &factors);

        tracing::info!(
            score,
            level = %level,
            factors = factors.len(),
            degraded = details.degraded.len(),
            "Risk analysis complete"
        );

        Ok(RiskAnalysis {
            level,
            score,
            reasons,
            recommendation,
            details,
        })
    }
}
