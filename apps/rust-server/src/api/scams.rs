// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};

use super::record_audit;
use crate::{
    error::ApiError,
    models::{ReportScamRequest, UpdateScamDatabaseRequest},
    risk::{RegistryStats, ScamReport},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

/// Report an address. It is denylisted for every later analysis.
#[utoipa::path(
    post,
    path = "/v1/scams/report",
    request_body = ReportScamRequest,
    tag = "Scams",
    responses(
        (status = 201, body = ScamReport),
        (status = 400, description = "Empty address")
    )
)]
pub async fn report_scam(
    State(state): State<AppState>,
    Json(request): Json<ReportScamRequest>,
) -> Result<(StatusCode, Json<ScamReport>), ApiError> {
    let report = state
        .registry
        .report_scam(&request.address, &request.evidence)?;
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::ScamReported)
            .with_resource("scam_address", report.address.clone()),
    );
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    put,
    path = "/v1/scams",
    request_body = UpdateScamDatabaseRequest,
    tag = "Scams",
    responses(
        (status = 200, body = RegistryStats),
        (status = 400, description = "A pattern failed to compile; nothing was applied")
    )
)]
pub async fn update_scam_database(
    State(state): State<AppState>,
    Json(request): Json<UpdateScamDatabaseRequest>,
) -> Result<Json<RegistryStats>, ApiError> {
    let added_addresses = request.addresses.len();
    let added_patterns = request.patterns.len();
    let stats = state
        .registry
        .update_scam_database(request.addresses, &request.patterns)?;
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::ScamDatabaseUpdated).with_details(serde_json::json!({
            "addresses": added_addresses,
            "patterns": added_patterns,
        })),
    );
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/v1/scams/reports",
    tag = "Scams",
    responses((status = 200, body = [ScamReport]))
)]
pub async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<ScamReport>>, ApiError> {
    Ok(Json(state.registry.reports()?))
}
