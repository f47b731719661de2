// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::risk::{AnalysisError, RegistryError};
use crate::security::{OtpError, TimeLockError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    }
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        let status = match e {
            OtpError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            OtpError::InvalidEmail => StatusCode::BAD_REQUEST,
            OtpError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            OtpError::Entropy => StatusCode::INTERNAL_SERVER_ERROR,
            OtpError::NoCode
            | OtpError::AlreadyUsed
            | OtpError::Expired
            | OtpError::AttemptsExhausted
            | OtpError::Mismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<TimeLockError> for ApiError {
    fn from(e: TimeLockError) -> Self {
        match e {
            TimeLockError::NotFound(_) => Self::not_found(e.to_string()),
            TimeLockError::AlreadyCancelled(_)
            | TimeLockError::AlreadyReleased(_)
            | TimeLockError::EarlyRelease { .. } => Self::conflict(e.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::InvalidPattern { .. } | RegistryError::EmptyAddress => {
                Self::bad_request(e.to_string())
            }
            RegistryError::Poisoned => Self::internal(e.to_string()),
        }
    }
}
