//! Request/response DTOs for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::crm::CrmProvider;

/// Query parameters on the OAuth callback redirect.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Serialize)]
pub struct OAuthCallbackResponse {
    pub success: bool,
    pub session_url: String,
    pub account_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    pub provider: CrmProvider,
    pub account_id: Uuid,
    #[validate(length(min = 8, max = 20, message = "phone must be in E.164 format"))]
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub success: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    pub provider: CrmProvider,
    pub account_id: Uuid,
    #[validate(length(min = 1, max = 16, message = "code must not be empty"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    pub provider: CrmProvider,
    pub account_id: Uuid,
    #[validate(length(min = 8, max = 20, message = "phone must be in E.164 format"))]
    pub phone: String,
    #[validate(range(min = 1, max = 720))]
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreateInvitationResponse {
    pub invite_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1, message = "token must not be empty"))]
    pub token: String,
    pub provider: CrmProvider,
}

#[derive(Debug, Serialize)]
pub struct AcceptInvitationResponse {
    pub success: bool,
    pub message: String,
}
