// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::risk::{
    AccountRiskEvaluator, RegistryError, RiskAggregator, ScamDetector, ScamRegistry,
    SignatureFeeEstimator, StaticAccountResolver, TransactionAnalyzer,
};
use crate::security::pin::EmptyPinKey;
use crate::security::{
    Clock, DisabledPinVerifier, EmailTransport, HashedPinVerifier, HttpEmailTransport,
    InMemoryOtpStore, OtpError, OtpService, PinVerifier, SecurityGate, SystemClock,
    TimeLockScheduler, TransportError,
};
use crate::storage::{AuditSink, JsonlAuditLog, StoragePaths};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("scam registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("OTP service: {0}")]
    Otp(#[from] OtpError),

    #[error("email transport: {0}")]
    Transport(#[from] TransportError),

    #[error("gate PIN: {0}")]
    Pin(#[from] EmptyPinKey),
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ScamRegistry>,
    pub aggregator: Arc<RiskAggregator>,
    pub gate: Arc<SecurityGate>,
    pub otp: Arc<OtpService>,
    pub timelocks: Arc<TimeLockScheduler>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// Production wiring: JSONL audit log under `DATA_DIR`, HTTP email relay
    /// when configured, system clock.
    pub fn build(config: &ServiceConfig) -> Result<Self, StateError> {
        let audit = Arc::new(JsonlAuditLog::new(StoragePaths::new(&config.data_dir)));
        Self::assemble(config, audit, email_transport(config)?, Arc::new(SystemClock))
    }

    /// Wire the service from explicit collaborators.
    pub fn assemble(
        config: &ServiceConfig,
        audit: Arc<dyn AuditSink>,
        transport: Arc<dyn EmailTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StateError> {
        let registry = Arc::new(ScamRegistry::with_entries(
            config.scam_addresses.clone(),
            &config.scam_patterns,
            config.malicious_programs.clone(),
        )?);

        let aggregator = Arc::new(
            RiskAggregator::new(
                ScamDetector::new(registry.clone()),
                TransactionAnalyzer::new(Arc::new(SignatureFeeEstimator::new(
                    config.lamports_per_signature,
                )))
                .with_fallback_fee(config.fallback_fee_sol),
                AccountRiskEvaluator::new(Arc::new(StaticAccountResolver::new(
                    config.strict_account_lookup,
                ))),
            )
            .with_timeout(config.analysis_timeout),
        );

        let otp = Arc::new(OtpService::new(
            Arc::new(InMemoryOtpStore::default()),
            transport,
            clock.clone(),
        )?);

        let timelocks =
            Arc::new(TimeLockScheduler::new(clock).with_sweep_interval(config.time_lock_sweep));

        let pin: Arc<dyn PinVerifier> = match &config.pin {
            Some(pin) => Arc::new(HashedPinVerifier::new(&pin.key, pin.digest.clone())?),
            None => Arc::new(DisabledPinVerifier),
        };

        let gate = Arc::new(
            SecurityGate::new(aggregator.clone(), otp.clone(), timelocks.clone())
                .with_pin_verifier(pin)
                .with_audit(audit.clone())
                .with_time_lock_delay(config.time_lock_delay),
        );

        Ok(Self {
            registry,
            aggregator,
            gate,
            otp,
            timelocks,
            audit,
        })
    }
}

fn email_transport(config: &ServiceConfig) -> Result<Arc<dyn EmailTransport>, StateError> {
    if let Some(url) = &config.email_api_url {
        return Ok(Arc::new(HttpEmailTransport::new(
            url.clone(),
            config.email_api_token.clone(),
        )?));
    }

    #[cfg(feature = "dev")]
    {
        tracing::warn!("DEV MODE: EMAIL_API_URL not set, OTP emails are logged instead of sent");
        Ok(Arc::new(crate::security::email::LogEmailTransport))
    }

    #[cfg(not(feature = "dev"))]
    {
        tracing::warn!("EMAIL_API_URL not set, OTP delivery is disabled");
        Ok(Arc::new(crate::security::UnconfiguredEmailTransport))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::security::otp::tests::RecordingTransport;
    use crate::security::{ManualClock, UnconfiguredEmailTransport};
    use crate::storage::MemoryAuditLog;

    pub(crate) struct TestState {
        pub state: AppState,
        pub transport: Arc<RecordingTransport>,
        pub audit: Arc<MemoryAuditLog>,
        pub clock: Arc<ManualClock>,
    }

    pub(crate) fn test_state(config: &ServiceConfig) -> TestState {
        let transport = Arc::new(RecordingTransport::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let clock = Arc::new(ManualClock::default());
        let state =
            AppState::assemble(config, audit.clone(), transport.clone(), clock.clone()).unwrap();
        TestState {
            state,
            transport,
            audit,
            clock,
        }
    }

    #[test]
    fn invalid_seed_pattern_fails_build() {
        let config = ServiceConfig {
            scam_patterns: vec!["(".into()],
            ..ServiceConfig::default()
        };
        let result = AppState::assemble(
            &config,
            Arc::new(MemoryAuditLog::default()),
            Arc::new(UnconfiguredEmailTransport),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(StateError::Registry(_))));
    }

    #[test]
    fn build_writes_audit_under_data_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = ServiceConfig {
            data_dir: temp.path().to_path_buf(),
            ..ServiceConfig::default()
        };
        let state = AppState::build(&config).unwrap();
        state
            .audit
            .record(&crate::storage::AuditEvent::new(
                crate::storage::AuditEventType::ScamReported,
            ))
            .unwrap();
        assert!(temp.path().join("audit").exists());
    }
}
