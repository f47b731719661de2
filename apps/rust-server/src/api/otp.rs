// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::ApiError,
    models::{OtpSentResponse, OtpVerifiedResponse, SendOtpRequest, VerifyOtpRequest},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/otp/send",
    request_body = SendOtpRequest,
    tag = "OTP",
    responses(
        (status = 202, body = OtpSentResponse),
        (status = 400, description = "Invalid email address"),
        (status = 429, description = "A code was sent less than a minute ago"),
        (status = 502, description = "Email delivery failed")
    )
)]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<(StatusCode, Json<OtpSentResponse>), ApiError> {
    state.otp.send_otp(&request.email).await?;
    Ok((StatusCode::ACCEPTED, Json(OtpSentResponse { sent: true })))
}

#[utoipa::path(
    post,
    path = "/v1/otp/verify",
    request_body = VerifyOtpRequest,
    tag = "OTP",
    responses(
        (status = 200, body = OtpVerifiedResponse),
        (status = 422, description = "Code wrong, expired, used or out of attempts")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<OtpVerifiedResponse>, ApiError> {
    state.otp.verify_otp(&request.email, &request.code).await?;
    Ok(Json(OtpVerifiedResponse { verified: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn send_then_verify() {
        let t = test_state(&ServiceConfig::default());
        let email = "User@Example.com";

        let (status, Json(sent)) = send_otp(
            State(t.state.clone()),
            Json(SendOtpRequest {
                email: email.into(),
            }),
        )
        .await
        .expect("code is sent");
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(sent.sent);

        let Json(verified) = verify_otp(
            State(t.state.clone()),
            Json(VerifyOtpRequest {
                email: "user@example.com".into(),
                code: t.transport.last_code(),
            }),
        )
        .await
        .expect("code verifies");
        assert!(verified.verified);
    }

    #[tokio::test]
    async fn resend_within_a_minute_is_rate_limited() {
        let t = test_state(&ServiceConfig::default());
        let request = SendOtpRequest {
            email: "user@example.com".into(),
        };

        let (status, _) = send_otp(State(t.state.clone()), Json(request.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        let err = send_otp(State(t.state.clone()), Json(request))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(t.transport.sends(), 1);
    }

    #[tokio::test]
    async fn verify_without_send_is_unprocessable() {
        let t = test_state(&ServiceConfig::default());
        let err = verify_otp(
            State(t.state.clone()),
            Json(VerifyOtpRequest {
                email: "user@example.com".into(),
                code: "123456".into(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
