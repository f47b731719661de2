// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AnalyzeRequest, OtpSentResponse, OtpVerifiedResponse, ReleaseResponse, ReportScamRequest,
        SecureRequest, SendOtpRequest, UpdateScamDatabaseRequest, VerifyOtpRequest,
    },
    risk::{
        AccountMeta, DetectorKind, Instruction, ProgramInteraction, RegistryStats, RiskAnalysis,
        RiskDetails, RiskFactor, RiskLevel, ScamCheckResult, ScamReport, Severity, Transaction,
        TransactionAnalysisResult, TransactionType,
    },
    security::{
        GateDecision, GateFailure, GateOutcome, GateStage, PendingTransaction, SecurityOptions,
        StageRecord, TimeLockEntry, TimeLockStatus,
    },
    state::AppState,
    storage::AuditEvent,
};

pub mod analysis;
pub mod health;
pub mod otp;
pub mod scams;
pub mod timelocks;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/analyze", post(analysis::analyze))
        .route("/secure", post(analysis::secure))
        .route("/otp/send", post(otp::send_otp))
        .route("/otp/verify", post(otp::verify_otp))
        .route("/timelocks/{id}", get(timelocks::get_time_lock))
        .route("/timelocks/{id}/cancel", post(timelocks::cancel_time_lock))
        .route("/timelocks/{id}/release", post(timelocks::release_time_lock))
        .route("/scams", put(scams::update_scam_database))
        .route("/scams/report", post(scams::report_scam))
        .route("/scams/reports", get(scams::list_reports))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

/// Write an audit event from a handler. A failed write is logged, never
/// surfaced to the caller.
pub(crate) fn record_audit(state: &AppState, event: AuditEvent) {
    if let Err(e) = state.audit.record(&event) {
        warn!(error = %e, event_type = ?event.event_type, "Failed to write audit event");
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        analysis::analyze,
        analysis::secure,
        otp::send_otp,
        otp::verify_otp,
        timelocks::get_time_lock,
        timelocks::cancel_time_lock,
        timelocks::release_time_lock,
        scams::report_scam,
        scams::update_scam_database,
        scams::list_reports
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            AnalyzeRequest,
            SecureRequest,
            Transaction,
            Instruction,
            AccountMeta,
            RiskAnalysis,
            RiskDetails,
            RiskLevel,
            RiskFactor,
            Severity,
            DetectorKind,
            ScamCheckResult,
            TransactionAnalysisResult,
            TransactionType,
            ProgramInteraction,
            SecurityOptions,
            GateDecision,
            GateOutcome,
            GateFailure,
            GateStage,
            StageRecord,
            PendingTransaction,
            TimeLockEntry,
            TimeLockStatus,
            ReleaseResponse,
            SendOtpRequest,
            VerifyOtpRequest,
            OtpSentResponse,
            OtpVerifiedResponse,
            ReportScamRequest,
            UpdateScamDatabaseRequest,
            ScamReport,
            RegistryStats
        )
    ),
    tags(
        (name = "Health", description = "Liveness and component status"),
        (name = "Analysis", description = "Transaction risk scoring and the security gate"),
        (name = "OTP", description = "Email one-time codes"),
        (name = "Time locks", description = "Delayed release of high-value transactions"),
        (name = "Scams", description = "Scam reports and denylist maintenance")
    )
)]
struct ApiDoc;
