// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::record_audit;
use crate::{
    error::ApiError,
    models::ReleaseResponse,
    security::TimeLockEntry,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

const RESOURCE_TYPE: &str = "time_lock";

#[utoipa::path(
    get,
    path = "/v1/timelocks/{id}",
    params(
        ("id" = Uuid, Path, description = "Time lock identifier returned by /v1/secure")
    ),
    tag = "Time locks",
    responses(
        (status = 200, body = TimeLockEntry),
        (status = 404, description = "Unknown or expired time lock")
    )
)]
pub async fn get_time_lock(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TimeLockEntry>, ApiError> {
    Ok(Json(state.timelocks.status(id)?))
}

#[utoipa::path(
    post,
    path = "/v1/timelocks/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Time lock identifier")
    ),
    tag = "Time locks",
    responses(
        (status = 200, body = TimeLockEntry),
        (status = 404, description = "Unknown or expired time lock"),
        (status = 409, description = "Already cancelled or released")
    )
)]
pub async fn cancel_time_lock(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TimeLockEntry>, ApiError> {
    let entry = state.timelocks.cancel(id)?;
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::TimeLockCancelled)
            .with_resource(RESOURCE_TYPE, id.to_string()),
    );
    Ok(Json(entry))
}

/// Hand a held transaction back for signing once its delay has elapsed.
#[utoipa::path(
    post,
    path = "/v1/timelocks/{id}/release",
    params(
        ("id" = Uuid, Path, description = "Time lock identifier")
    ),
    tag = "Time locks",
    responses(
        (status = 200, body = ReleaseResponse),
        (status = 404, description = "Unknown or expired time lock"),
        (status = 409, description = "Still locked, cancelled or already released")
    )
)]
pub async fn release_time_lock(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let (time_lock, transaction) = state.timelocks.release(id)?;
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::TimeLockReleased)
            .with_resource(RESOURCE_TYPE, id.to_string())
            .with_details(serde_json::json!({ "value": time_lock.pending.value })),
    );
    Ok(Json(ReleaseResponse {
        time_lock,
        transaction,
    }))
}
