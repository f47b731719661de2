// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Security gate
//!
//! Runs a transaction through risk analysis and the enabled authentication
//! factors before handing it back to the caller. The gate never signs or
//! submits anything.
//!
//! ## Stages
//!
//! ```text
//! Analyzing ─▶ Biometric? ─▶ Pin? ─▶ Otp? ─▶ TimeLock? ─▶ Approved
//!     │            │          │       │         │
//!     └────────────┴──────────┴───────┴─────────┼──▶ Blocked
//!                                               └──▶ Pending
//! ```
//!
//! Stages run in that fixed order and only when enabled in
//! [`SecurityOptions`]. The first failing stage blocks the transaction and no
//! later stage runs.
//!
//! ## OTP over HTTP
//!
//! The OTP stage spans two requests. Without `otp_code` it sends a code (if
//! none is outstanding) and blocks with a reason asking for resubmission.
//! With `otp_code` it verifies. A code authorizes only the submission that
//! carried it.
//!
//! ## Degraded analysis
//!
//! When a detector fails the analysis still scores, but the policy blocks it
//! unless `bypass_warnings` is set.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::biometric::{BiometricAuthenticator, UnavailableBiometric};
use super::otp::OtpService;
use super::pin::{DisabledPinVerifier, PinVerifier};
use super::timelock::{PendingTransaction, TimeLockScheduler, DEFAULT_TIME_LOCK_DELAY};
use crate::risk::{AnalysisError, RiskAggregator, RiskAnalysis, RiskLevel, Transaction};
use crate::storage::{AuditEvent, AuditEventType, AuditSink};

pub const BIOMETRIC_FAILED: &str = "Biometric authentication failed";
pub const PIN_INCORRECT: &str = "Incorrect PIN";
pub const PIN_REQUIRED: &str = "PIN entry required";
pub const OTP_EMAIL_REQUIRED: &str = "Email address required for OTP verification";
pub const OTP_CODE_SENT: &str = "Verification code sent; resubmit with otp_code";
pub const ANALYSIS_INCOMPLETE: &str = "Risk analysis incomplete";

/// Per-request gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SecurityOptions {
    /// Run risk analysis first.
    pub simulate: bool,
    pub biometric: bool,
    pub pin: bool,
    pub otp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<String>,
    /// Value in SOL above which the transaction is time-locked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_lock_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    /// Let `medium` and `high` risk transactions continue to the next stage.
    pub bypass_warnings: bool,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            simulate: true,
            biometric: false,
            pin: false,
            otp: false,
            otp_code: None,
            pin_code: None,
            time_lock_threshold: None,
            email_address: None,
            bypass_warnings: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    Analyzing,
    Biometric,
    Pin,
    Otp,
    TimeLock,
}

impl GateStage {
    pub const ORDER: [GateStage; 5] = [
        GateStage::Analyzing,
        GateStage::Biometric,
        GateStage::Pin,
        GateStage::Otp,
        GateStage::TimeLock,
    ];

    pub fn is_enabled(self, options: &SecurityOptions) -> bool {
        match self {
            GateStage::Analyzing => true,
            GateStage::Biometric => options.biometric,
            GateStage::Pin => options.pin,
            GateStage::Otp => options.otp,
            GateStage::TimeLock => options.time_lock_threshold.is_some(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateStage::Analyzing => "analyzing",
            GateStage::Biometric => "biometric",
            GateStage::Pin => "pin",
            GateStage::Otp => "otp",
            GateStage::TimeLock => "time_lock",
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Running(GateStage),
    Approved,
    Blocked,
    Pending,
}

/// State after `current` passes: the next enabled stage, or `Approved`.
pub fn next_state(current: GateStage, options: &SecurityOptions) -> GateState {
    GateStage::ORDER
        .into_iter()
        .filter(|stage| *stage > current)
        .find(|stage| stage.is_enabled(options))
        .map_or(GateState::Approved, GateState::Running)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Approved,
    Blocked,
    Pending,
}

/// Why a transaction was blocked.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateFailure {
    #[error("{reason}")]
    PolicyViolation { level: RiskLevel, reason: String },

    #[error("{reason}")]
    StageFailure { stage: GateStage, reason: String },
}

impl GateFailure {
    fn stage(stage: GateStage, reason: impl Into<String>) -> Self {
        GateFailure::StageFailure {
            stage,
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            GateFailure::PolicyViolation { reason, .. } | GateFailure::StageFailure { reason, .. } => {
                reason
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageRecord {
    pub stage: GateStage,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GateDecision {
    pub outcome: GateOutcome,
    /// Present when the transaction was simulated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<RiskAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<GateFailure>,
    /// Set when the transaction was time-locked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingTransaction>,
    pub stages: Vec<StageRecord>,
}

impl GateDecision {
    pub fn is_approved(&self) -> bool {
        self.outcome == GateOutcome::Approved
    }
}

enum StageResult {
    Passed(Option<String>),
    Failed(GateFailure),
    Held(PendingTransaction),
}

pub struct SecurityGate {
    aggregator: Arc<RiskAggregator>,
    otp: Arc<OtpService>,
    timelocks: Arc<TimeLockScheduler>,
    biometric: Arc<dyn BiometricAuthenticator>,
    pin: Arc<dyn PinVerifier>,
    audit: Option<Arc<dyn AuditSink>>,
    time_lock_delay: Duration,
}

impl SecurityGate {
    pub fn new(
        aggregator: Arc<RiskAggregator>,
        otp: Arc<OtpService>,
        timelocks: Arc<TimeLockScheduler>,
    ) -> Self {
        Self {
            aggregator,
            otp,
            timelocks,
            biometric: Arc::new(UnavailableBiometric),
            pin: Arc::new(DisabledPinVerifier),
            audit: None,
            time_lock_delay: DEFAULT_TIME_LOCK_DELAY,
        }
    }

    pub fn with_biometric(mut self, biometric: Arc<dyn BiometricAuthenticator>) -> Self {
        self.biometric = biometric;
        self
    }

    pub fn with_pin_verifier(mut self, pin: Arc<dyn PinVerifier>) -> Self {
        self.pin = pin;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_time_lock_delay(mut self, delay: Duration) -> Self {
        self.time_lock_delay = delay;
        self
    }

    /// Drive `tx` through every enabled stage.
    ///
    /// Returns `Err` only when risk analysis could not produce a result;
    /// a blocked transaction is an `Ok` decision.
    pub async fn secure_transaction(
        &self,
        tx: Transaction,
        options: &SecurityOptions,
    ) -> Result<GateDecision, AnalysisError> {
        let mut analysis = None;
        let mut stages = Vec::new();
        let mut state = GateState::Running(GateStage::Analyzing);
        let mut failure = None;
        let mut pending = None;

        while let GateState::Running(stage) = state {
            let result = match self.run_stage(stage, &tx, options, &mut analysis).await {
                Ok(result) => result,
                Err(e) => {
                    self.record_analysis_failure(&e);
                    return Err(e);
                }
            };

            state = match result {
                StageResult::Passed(note) => {
                    info!(stage = %stage, "Gate stage passed");
                    stages.push(StageRecord {
                        stage,
                        passed: true,
                        reason: note,
                    });
                    next_state(stage, options)
                }
                StageResult::Failed(f) => {
                    warn!(stage = %stage, reason = f.reason(), "Gate stage failed");
                    stages.push(StageRecord {
                        stage,
                        passed: false,
                        reason: Some(f.reason().to_string()),
                    });
                    failure = Some(f);
                    GateState::Blocked
                }
                StageResult::Held(p) => {
                    info!(stage = %stage, id = %p.id, "Gate stage held transaction");
                    stages.push(StageRecord {
                        stage,
                        passed: true,
                        reason: Some(format!("held until {}", p.unlock_at)),
                    });
                    pending = Some(p);
                    GateState::Pending
                }
            };
        }

        let outcome = match state {
            GateState::Blocked => GateOutcome::Blocked,
            GateState::Pending => GateOutcome::Pending,
            _ => GateOutcome::Approved,
        };
        let reason = match (&failure, &pending) {
            (Some(f), _) => Some(f.reason().to_string()),
            (None, Some(p)) => Some(format!(
                "Transaction value exceeds the time-lock threshold; locked until {}",
                p.unlock_at
            )),
            (None, None) => None,
        };

        let decision = GateDecision {
            outcome,
            analysis,
            reason,
            failure,
            pending,
            stages,
        };
        info!(outcome = ?decision.outcome, stages = decision.stages.len(), "Gate decision");
        self.record_decision(&decision);
        Ok(decision)
    }

    async fn run_stage(
        &self,
        stage: GateStage,
        tx: &Transaction,
        options: &SecurityOptions,
        analysis: &mut Option<RiskAnalysis>,
    ) -> Result<StageResult, AnalysisError> {
        let result = match stage {
            GateStage::Analyzing => {
                if !options.simulate {
                    return Ok(StageResult::Passed(Some("simulation skipped".to_string())));
                }
                let result = self.aggregator.analyze(tx).await?;
                let verdict = policy(&result, options.bypass_warnings);
                *analysis = Some(result);
                verdict
            }
            GateStage::Biometric => self.check_biometric().await,
            GateStage::Pin => self.check_pin(options),
            GateStage::Otp => self.check_otp(options).await,
            GateStage::TimeLock => self.check_time_lock(tx, options),
        };
        Ok(result)
    }

    async fn check_biometric(&self) -> StageResult {
        if !self.biometric.is_available().await {
            return StageResult::Failed(GateFailure::stage(GateStage::Biometric, BIOMETRIC_FAILED));
        }
        let assertion = self.biometric.authenticate().await;
        if assertion.success {
            StageResult::Passed(None)
        } else {
            warn!(error = ?assertion.error, "Biometric assertion rejected");
            StageResult::Failed(GateFailure::stage(GateStage::Biometric, BIOMETRIC_FAILED))
        }
    }

    fn check_pin(&self, options: &SecurityOptions) -> StageResult {
        match options.pin_code.as_deref().filter(|pin| !pin.is_empty()) {
            None => StageResult::Failed(GateFailure::stage(GateStage::Pin, PIN_REQUIRED)),
            Some(pin) if self.pin.verify_pin(pin) => StageResult::Passed(None),
            Some(_) => StageResult::Failed(GateFailure::stage(GateStage::Pin, PIN_INCORRECT)),
        }
    }

    async fn check_otp(&self, options: &SecurityOptions) -> StageResult {
        let Some(email) = options.email_address.as_deref() else {
            return StageResult::Failed(GateFailure::stage(GateStage::Otp, OTP_EMAIL_REQUIRED));
        };

        if let Some(code) = options.otp_code.as_deref() {
            return match self.otp.verify_otp(email, code).await {
                Ok(()) => StageResult::Passed(None),
                Err(e) => StageResult::Failed(GateFailure::stage(
                    GateStage::Otp,
                    format!("OTP verification failed: {e}"),
                )),
            };
        }

        // A verified code is consumed by the submission that carried it; later
        // submissions need a fresh code.
        match self.otp.ensure_sent(email).await {
            Ok(_) => StageResult::Failed(GateFailure::stage(GateStage::Otp, OTP_CODE_SENT)),
            Err(e) => StageResult::Failed(GateFailure::stage(
                GateStage::Otp,
                format!("OTP verification failed: {e}"),
            )),
        }
    }

    fn check_time_lock(&self, tx: &Transaction, options: &SecurityOptions) -> StageResult {
        let Some(threshold) = options.time_lock_threshold else {
            return StageResult::Passed(None);
        };
        let value = tx.value_sol();
        if value > threshold {
            StageResult::Held(self.timelocks.schedule(tx.clone(), value, self.time_lock_delay))
        } else {
            StageResult::Passed(None)
        }
    }

    fn record_decision(&self, decision: &GateDecision) {
        let event_type = match decision.outcome {
            GateOutcome::Approved => AuditEventType::GateApproved,
            GateOutcome::Blocked => AuditEventType::GateBlocked,
            GateOutcome::Pending => AuditEventType::GatePending,
        };
        let mut event = AuditEvent::new(event_type).with_details(serde_json::json!({
            "score": decision.analysis.as_ref().map(|a| a.score),
            "level": decision.analysis.as_ref().map(|a| a.level),
            "stages": decision.stages,
        }));
        if let Some(p) = &decision.pending {
            event = event.with_resource("time_lock", p.id.to_string());
        }
        if let Some(reason) = decision.failure.as_ref().map(GateFailure::reason) {
            event = event.failed(reason);
        }
        self.audit(&event);
    }

    fn record_analysis_failure(&self, error: &AnalysisError) {
        self.audit(&AuditEvent::new(AuditEventType::GateBlocked).failed(error.to_string()));
    }

    fn audit(&self, event: &AuditEvent) {
        if let Some(sink) = &self.audit {
            if let Err(e) = sink.record(event) {
                warn!(error = %e, "Failed to write audit event");
            }
        }
    }
}

/// Risk policy applied after analysis.
///
/// A degraded analysis is never treated as safe: it needs `bypass_warnings`
/// like any medium or high result.
fn policy(analysis: &RiskAnalysis, bypass_warnings: bool) -> StageResult {
    let degraded = &analysis.details.degraded;
    if !degraded.is_empty() {
        let detectors = degraded
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if bypass_warnings {
            return StageResult::Passed(Some(format!(
                "incomplete analysis accepted by caller ({detectors})"
            )));
        }
        return StageResult::Failed(GateFailure::PolicyViolation {
            level: analysis.level,
            reason: format!("{ANALYSIS_INCOMPLETE}: {detectors} could not complete"),
        });
    }

    match analysis.level {
        RiskLevel::Safe => StageResult::Passed(None),
        _ if bypass_warnings => StageResult::Passed(Some(format!(
            "{} risk accepted by caller",
            analysis.level
        ))),
        RiskLevel::High => StageResult::Failed(GateFailure::PolicyViolation {
            level: RiskLevel::High,
            reason: analysis.recommendation.clone(),
        }),
        RiskLevel::Medium => StageResult::Failed(GateFailure::PolicyViolation {
            level: RiskLevel::Medium,
            reason: format!(
                "Medium risk requires explicit approval (bypass_warnings). {}",
                analysis.recommendation
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::risk::accounts::ResolverError;
    use crate::risk::{
        AccountInfo, AccountMeta, AccountResolver, AccountRiskEvaluator, DetectorKind,
        Instruction, ScamDetector, ScamRegistry, SignatureFeeEstimator, StaticAccountResolver,
        TransactionAnalyzer,
    };
    use crate::security::biometric::BiometricAssertion;
    use crate::security::clock::ManualClock;
    use crate::security::otp::tests::RecordingTransport;
    use crate::security::otp::InMemoryOtpStore;
    use crate::security::pin::HashedPinVerifier;
    use crate::security::timelock::TimeLockStatus;
    use crate::storage::MemoryAuditLog;

    const EMAIL: &str = "owner@example.com";

    #[derive(Default)]
    struct CountingPin {
        calls: AtomicUsize,
    }

    impl PinVerifier for CountingPin {
        fn verify_pin(&self, _pin: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    struct ApprovingBiometric;

    #[async_trait]
    impl BiometricAuthenticator for ApprovingBiometric {
        async fn is_available(&self) -> bool {
            true
        }

        async fn authenticate(&self) -> BiometricAssertion {
            BiometricAssertion {
                success: true,
                credential_id: Some("cred-1".into()),
                error: None,
            }
        }
    }

    struct Harness {
        gate: SecurityGate,
        transport: Arc<RecordingTransport>,
        timelocks: Arc<TimeLockScheduler>,
        audit: Arc<MemoryAuditLog>,
    }

    struct UnreachableResolver;

    #[async_trait]
    impl AccountResolver for UnreachableResolver {
        async fn resolve(&self, _pubkey: &str) -> Result<Option<AccountInfo>, ResolverError> {
            Err(ResolverError("connection refused".into()))
        }
    }

    fn harness() -> Harness {
        harness_with_resolver(Arc::new(StaticAccountResolver::new(false)))
    }

    fn harness_with_resolver(resolver: Arc<dyn AccountResolver>) -> Harness {
        let aggregator = Arc::new(RiskAggregator::new(
            ScamDetector::new(Arc::new(ScamRegistry::new())),
            TransactionAnalyzer::new(Arc::new(SignatureFeeEstimator::default())),
            AccountRiskEvaluator::new(resolver),
        ));
        let clock = Arc::new(ManualClock::default());
        let transport = Arc::new(RecordingTransport::default());
        let otp = Arc::new(
            OtpService::new(
                Arc::new(InMemoryOtpStore::default()),
                transport.clone(),
                clock.clone(),
            )
            .unwrap(),
        );
        let timelocks = Arc::new(TimeLockScheduler::new(clock));
        let audit = Arc::new(MemoryAuditLog::default());
        let gate = SecurityGate::new(aggregator, otp, timelocks.clone())
            .with_pin_verifier(Arc::new(HashedPinVerifier::from_pin(b"k", "2468").unwrap()))
            .with_audit(audit.clone());
        Harness {
            gate,
            transport,
            timelocks,
            audit,
        }
    }

    fn safe_tx(lamports: u64) -> Transaction {
        Transaction::new(vec![Instruction::system_transfer("Alice1", "Bob1", lamports)])
    }

    fn medium_tx() -> Transaction {
        Transaction::new(vec![Instruction::new(
            "Mystery1",
            vec![AccountMeta::signer("Alice1")],
            vec![1],
        )])
    }

    fn high_tx() -> Transaction {
        Transaction::new(
            (0..16)
                .map(|i| Instruction::system_transfer("Victim1", &format!("Dest{i}"), 1))
                .collect(),
        )
    }

    fn stage_names(decision: &GateDecision) -> Vec<GateStage> {
        decision.stages.iter().map(|s| s.stage).collect()
    }

    #[test]
    fn next_state_skips_disabled_stages() {
        let options = SecurityOptions {
            pin: true,
            time_lock_threshold: Some(1.0),
            ..SecurityOptions::default()
        };
        assert_eq!(
            next_state(GateStage::Analyzing, &options),
            GateState::Running(GateStage::Pin)
        );
        assert_eq!(
            next_state(GateStage::Pin, &options),
            GateState::Running(GateStage::TimeLock)
        );
        assert_eq!(next_state(GateStage::TimeLock, &options), GateState::Approved);
        assert_eq!(
            next_state(GateStage::Analyzing, &SecurityOptions::default()),
            GateState::Approved
        );
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SecurityOptions = serde_json::from_str(r#"{"pin": true}"#).unwrap();
        assert!(options.simulate);
        assert!(options.pin);
        assert!(!options.bypass_warnings);
    }

    #[tokio::test]
    async fn safe_transaction_is_approved() {
        let h = harness();
        let decision = h
            .gate
            .secure_transaction(safe_tx(1), &SecurityOptions::default())
            .await
            .unwrap();
        assert!(decision.is_approved());
        assert_eq!(decision.analysis.as_ref().unwrap().level, RiskLevel::Safe);
        assert_eq!(stage_names(&decision), vec![GateStage::Analyzing]);
        assert_eq!(h.audit.events()[0].event_type, AuditEventType::GateApproved);
    }

    #[tokio::test]
    async fn high_risk_is_blocked_with_recommendation() {
        let h = harness();
        let decision = h
            .gate
            .secure_transaction(high_tx(), &SecurityOptions::default())
            .await
            .unwrap();
        assert_eq!(decision.outcome, GateOutcome::Blocked);
        let analysis = decision.analysis.as_ref().unwrap();
        assert_eq!(
            decision.failure,
            Some(GateFailure::PolicyViolation {
                level: RiskLevel::High,
                reason: analysis.recommendation.clone(),
            })
        );
        let event = &h.audit.events()[0];
        assert_eq!(event.event_type, AuditEventType::GateBlocked);
        assert!(!event.success);
    }

    #[tokio::test]
    async fn medium_risk_needs_bypass() {
        let h = harness();
        let blocked = h
            .gate
            .secure_transaction(medium_tx(), &SecurityOptions::default())
            .await
            .unwrap();
        assert_eq!(blocked.outcome, GateOutcome::Blocked);
        assert!(matches!(
            blocked.failure,
            Some(GateFailure::PolicyViolation {
                level: RiskLevel::Medium,
                ..
            })
        ));

        let options = SecurityOptions {
            bypass_warnings: true,
            ..SecurityOptions::default()
        };
        let approved = h.gate.secure_transaction(medium_tx(), &options).await.unwrap();
        assert!(approved.is_approved());
    }

    #[tokio::test]
    async fn biometric_failure_stops_later_stages() {
        let h = harness();
        let pin = Arc::new(CountingPin::default());
        let gate = h.gate.with_pin_verifier(pin.clone());
        let options = SecurityOptions {
            biometric: true,
            pin: true,
            pin_code: Some("2468".into()),
            otp: true,
            email_address: Some(EMAIL.into()),
            ..SecurityOptions::default()
        };

        let decision = gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert_eq!(decision.outcome, GateOutcome::Blocked);
        assert_eq!(decision.reason.as_deref(), Some(BIOMETRIC_FAILED));
        assert_eq!(
            stage_names(&decision),
            vec![GateStage::Analyzing, GateStage::Biometric]
        );
        assert_eq!(pin.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.transport.sends(), 0);
    }

    #[tokio::test]
    async fn pin_stage_reasons() {
        let h = harness();
        let mut options = SecurityOptions {
            pin: true,
            ..SecurityOptions::default()
        };

        let missing = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert_eq!(missing.reason.as_deref(), Some(PIN_REQUIRED));

        options.pin_code = Some("0000".into());
        let wrong = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert_eq!(wrong.reason.as_deref(), Some(PIN_INCORRECT));

        options.pin_code = Some("2468".into());
        let right = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert!(right.is_approved());
    }

    #[tokio::test]
    async fn otp_spans_two_submissions() {
        let h = harness();
        let gate = h.gate.with_biometric(Arc::new(ApprovingBiometric));
        let mut options = SecurityOptions {
            biometric: true,
            otp: true,
            email_address: Some(EMAIL.into()),
            ..SecurityOptions::default()
        };

        let first = gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert_eq!(first.outcome, GateOutcome::Blocked);
        assert_eq!(first.reason.as_deref(), Some(OTP_CODE_SENT));
        assert_eq!(h.transport.sends(), 1);

        options.otp_code = Some(h.transport.last_code());
        let second = gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert!(second.is_approved());
        assert_eq!(
            stage_names(&second),
            vec![GateStage::Analyzing, GateStage::Biometric, GateStage::Otp]
        );
        assert_eq!(h.transport.sends(), 1);
    }

    #[tokio::test]
    async fn verified_code_does_not_authorize_a_later_transaction() {
        let h = harness();
        let mut options = SecurityOptions {
            otp: true,
            email_address: Some(EMAIL.into()),
            ..SecurityOptions::default()
        };

        h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        options.otp_code = Some(h.transport.last_code());
        let first = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert!(first.is_approved());

        options.otp_code = None;
        let other = Transaction::new(vec![Instruction::system_transfer("Alice1", "Mallory1", 999)]);
        for _ in 0..2 {
            let decision = h
                .gate
                .secure_transaction(other.clone(), &options)
                .await
                .unwrap();
            assert_eq!(decision.outcome, GateOutcome::Blocked);
            assert_eq!(
                decision.stages.last().map(|s| (s.stage, s.passed)),
                Some((GateStage::Otp, false))
            );
        }

        options.otp_code = Some(h.transport.last_code());
        let replay = h.gate.secure_transaction(other, &options).await.unwrap();
        assert_eq!(replay.outcome, GateOutcome::Blocked);
    }

    #[tokio::test]
    async fn degraded_analysis_is_blocked() {
        let h = harness_with_resolver(Arc::new(UnreachableResolver));
        let decision = h
            .gate
            .secure_transaction(safe_tx(1), &SecurityOptions::default())
            .await
            .unwrap();

        assert_eq!(decision.outcome, GateOutcome::Blocked);
        let analysis = decision.analysis.as_ref().unwrap();
        assert_eq!(analysis.details.degraded, vec![DetectorKind::AccountEvaluator]);
        match decision.failure {
            Some(GateFailure::PolicyViolation { reason, .. }) => {
                assert!(reason.starts_with(ANALYSIS_INCOMPLETE));
                assert!(reason.contains("Account evaluator"));
            }
            other => panic!("expected policy violation, got {other:?}"),
        }
        assert!(!h.audit.events()[0].success);
    }

    #[tokio::test]
    async fn degraded_analysis_passes_with_bypass() {
        let h = harness_with_resolver(Arc::new(UnreachableResolver));
        let options = SecurityOptions {
            bypass_warnings: true,
            ..SecurityOptions::default()
        };
        let decision = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();

        assert!(decision.is_approved());
        assert!(decision.stages[0]
            .reason
            .as_deref()
            .unwrap()
            .contains("incomplete analysis"));
    }

    #[tokio::test]
    async fn otp_without_email_is_blocked() {
        let h = harness();
        let options = SecurityOptions {
            otp: true,
            ..SecurityOptions::default()
        };
        let decision = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert_eq!(decision.reason.as_deref(), Some(OTP_EMAIL_REQUIRED));
    }

    #[tokio::test]
    async fn three_wrong_codes_exhaust_attempts() {
        let h = harness();
        let mut options = SecurityOptions {
            otp: true,
            email_address: Some(EMAIL.into()),
            ..SecurityOptions::default()
        };
        h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        let code = h.transport.last_code();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        options.otp_code = Some(wrong.into());
        for _ in 0..3 {
            let decision = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
            assert!(decision.reason.unwrap().contains("incorrect verification code"));
        }

        options.otp_code = Some(code);
        let decision = h.gate.secure_transaction(safe_tx(1), &options).await.unwrap();
        assert_eq!(decision.outcome, GateOutcome::Blocked);
        assert!(decision.reason.unwrap().contains("too many incorrect attempts"));
    }

    #[tokio::test]
    async fn value_above_threshold_is_time_locked() {
        let h = harness();
        let options = SecurityOptions {
            time_lock_threshold: Some(1.0),
            ..SecurityOptions::default()
        };

        let decision = h
            .gate
            .secure_transaction(safe_tx(5_000_000_000), &options)
            .await
            .unwrap();
        assert_eq!(decision.outcome, GateOutcome::Pending);
        let pending = decision.pending.unwrap();
        assert_eq!(pending.value, 5.0);
        assert_eq!(
            h.timelocks.status(pending.id).unwrap().status,
            TimeLockStatus::Pending
        );
        assert_eq!(h.audit.events()[0].event_type, AuditEventType::GatePending);

        let below = h
            .gate
            .secure_transaction(safe_tx(500_000_000), &options)
            .await
            .unwrap();
        assert!(below.is_approved());
    }

    #[tokio::test]
    async fn simulation_can_be_skipped() {
        let h = harness();
        let options = SecurityOptions {
            simulate: false,
            ..SecurityOptions::default()
        };
        let decision = h.gate.secure_transaction(high_tx(), &options).await.unwrap();
        assert!(decision.is_approved());
        assert!(decision.analysis.is_none());
    }
}
