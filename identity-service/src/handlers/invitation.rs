use axum::{Json, extract::State, http::HeaderMap};
use service_core::error::AppError;
use validator::Validate;

use super::bearer_token;
use crate::AppState;
use crate::dtos::{
    AcceptInvitationRequest, AcceptInvitationResponse, CreateInvitationRequest,
    CreateInvitationResponse,
};

const ADMIN_KEY_HEADER: &str = "x-admin-api-key";

/// Admin-only: issue an invitation token for an account's provider link.
#[tracing::instrument(skip(state, headers, body), fields(provider = %body.provider, account_id = %body.account_id))]
pub async fn create_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateInvitationRequest>,
) -> Result<Json<CreateInvitationResponse>, AppError> {
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented.is_empty() || presented != state.config.security.admin_api_key {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Missing or invalid admin API key"
        )));
    }

    body.validate()?;

    let issued = state
        .invitations
        .create(
            body.provider,
            body.account_id,
            body.phone.trim(),
            body.expires_in_hours,
        )
        .await?;

    Ok(Json(CreateInvitationResponse {
        invite_token: issued.token,
        expires_at: issued.expiry_utc,
    }))
}

/// Redeem an invitation token. The caller authenticates with a bearer session
/// token; the token must belong to the invited account.
#[tracing::instrument(skip(state, headers, body), fields(provider = %body.provider))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AcceptInvitationRequest>,
) -> Result<Json<AcceptInvitationResponse>, AppError> {
    body.validate()?;

    let bearer = bearer_token(&headers)?;
    let claims = state.sessions.verify_bearer(bearer)?;

    state
        .invitations
        .accept(body.provider, body.token.trim(), claims.sub)
        .await?;

    Ok(Json(AcceptInvitationResponse {
        success: true,
        message: "Invitation accepted; a verification code has been sent".to_string(),
    }))
}
