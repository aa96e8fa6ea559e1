use axum::{Json, extract::State};
use service_core::error::AppError;
use validator::Validate;

use crate::AppState;
use crate::dtos::{SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse};
use crate::services::VerifyOutcome;

#[tracing::instrument(skip(state, body), fields(provider = %body.provider, account_id = %body.account_id))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, AppError> {
    body.validate()?;

    let expires_at = state
        .verification
        .send_otp(body.provider, body.account_id, body.phone.trim())
        .await?;

    Ok(Json(SendOtpResponse {
        success: true,
        expires_at,
    }))
}

/// Verify a submitted OTP code. Rejections are 200-level outcomes carrying a
/// machine-readable reason, so the client can distinguish "re-enter" from
/// "request a new code".
#[tracing::instrument(skip(state, body), fields(provider = %body.provider, account_id = %body.account_id))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, AppError> {
    body.validate()?;

    let outcome = state
        .verification
        .verify_otp(body.provider, body.account_id, body.code.trim())
        .await?;

    let response = match outcome {
        VerifyOutcome::Verified => VerifyOtpResponse {
            success: true,
            error: None,
        },
        VerifyOutcome::Rejected(rejection) => VerifyOtpResponse {
            success: false,
            error: Some(rejection.as_str()),
        },
    };

    Ok(Json(response))
}
