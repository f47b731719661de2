// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    error::ApiError,
    models::{AnalyzeRequest, SecureRequest},
    risk::{RiskAnalysis, Transaction},
    security::GateDecision,
    state::AppState,
};

fn validated(tx: Transaction) -> Result<Transaction, ApiError> {
    tx.validate()
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;
    Ok(tx)
}

#[utoipa::path(
    post,
    path = "/v1/analyze",
    request_body = AnalyzeRequest,
    tag = "Analysis",
    responses(
        (status = 200, body = RiskAnalysis),
        (status = 422, description = "Malformed transaction"),
        (status = 503, description = "Analysis timed out or every detector failed")
    )
)]
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<RiskAnalysis>, ApiError> {
    let tx = validated(request.transaction)?;
    let analysis = state.aggregator.analyze(&tx).await?;
    Ok(Json(analysis))
}

/// Run a transaction through the security gate.
///
/// Blocked and pending transactions are still `200`: the body carries the
/// decision.
#[utoipa::path(
    post,
    path = "/v1/secure",
    request_body = SecureRequest,
    tag = "Analysis",
    responses(
        (status = 200, body = GateDecision),
        (status = 422, description = "Malformed transaction"),
        (status = 503, description = "Analysis timed out or every detector failed")
    )
)]
pub async fn secure(
    State(state): State<AppState>,
    Json(request): Json<SecureRequest>,
) -> Result<Json<GateDecision>, ApiError> {
    let tx = validated(request.transaction)?;
    let decision = state.gate.secure_transaction(tx, &request.options).await?;
    Ok(Json(decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::risk::{Instruction, RiskLevel};
    use crate::security::{GateOutcome, SecurityOptions};
    use crate::state::tests::test_state;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn analyze_empty_transaction_is_safe() {
        let t = test_state(&ServiceConfig::default());
        let Json(analysis) = analyze(
            State(t.state.clone()),
            Json(AnalyzeRequest {
                transaction: Transaction::new(Vec::new()),
            }),
        )
        .await
        .expect("analysis succeeds");

        assert_eq!(analysis.score, 95);
        assert_eq!(analysis.level, RiskLevel::Safe);
    }

    #[tokio::test]
    async fn analyze_rejects_empty_program_id() {
        let t = test_state(&ServiceConfig::default());
        let err = analyze(
            State(t.state.clone()),
            Json(AnalyzeRequest {
                transaction: Transaction::new(vec![Instruction::new("", Vec::new(), Vec::new())]),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn denylisted_destination_is_blocked() {
        let t = test_state(&ServiceConfig {
            scam_addresses: vec!["Thief1".into()],
            ..ServiceConfig::default()
        });
        let tx = Transaction::new(vec![Instruction::system_transfer("Alice1", "Thief1", 10)]);

        let Json(decision) = secure(
            State(t.state.clone()),
            Json(SecureRequest {
                transaction: tx,
                options: SecurityOptions::default(),
            }),
        )
        .await
        .expect("a blocked decision is still a response");

        assert_eq!(decision.outcome, GateOutcome::Blocked);
        assert!(decision.analysis.unwrap().score < 80);
        assert_eq!(t.audit.events().len(), 1);
    }

    #[tokio::test]
    async fn safe_transfer_is_approved() {
        let t = test_state(&ServiceConfig::default());
        let tx = Transaction::new(vec![Instruction::system_transfer("Alice1", "Bob1", 10)]);

        let Json(decision) = secure(
            State(t.state.clone()),
            Json(SecureRequest {
                transaction: tx,
                options: SecurityOptions::default(),
            }),
        )
        .await
        .unwrap();

        assert!(decision.is_approved());
    }
}
