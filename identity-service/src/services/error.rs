use service_core::error::AppError;
use thiserror::Error;

use crate::crm::CrmError;
use crate::whatsapp::DispatchError;

/// Failure taxonomy for identity resolution, verification and invitations.
///
/// None of these are retried automatically within a request; the expected
/// duplicate-create race during identity resolution is recovered locally and
/// never surfaces here.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Upstream rejected the authorization code: {0}")]
    UpstreamAuth(String),

    #[error("Upstream profile fetch failed: {0}")]
    UpstreamProfile(String),

    #[error("Account creation failed: {0}")]
    AccountCreationFailed(String),

    #[error("Session issuance failed: {0}")]
    SessionIssuanceFailed(String),

    #[error("Invalid session token: {0}")]
    InvalidSession(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("WhatsApp delivery failed: {0}")]
    Delivery(String),

    #[error("Invitation token does not match this account")]
    TokenMismatch,

    #[error("Invitation token has expired")]
    TokenExpired,

    #[error("No account or provider link found")]
    UnknownAccount,
}

impl From<CrmError> for ServiceError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::UpstreamAuth { .. } => ServiceError::UpstreamAuth(err.to_string()),
            CrmError::UpstreamProfile { .. } => ServiceError::UpstreamProfile(err.to_string()),
        }
    }
}

impl From<DispatchError> for ServiceError {
    fn from(err: DispatchError) -> Self {
        ServiceError::Delivery(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            // Authorization codes are single-use; a rejected exchange is the
            // caller's problem, not ours.
            ServiceError::UpstreamAuth(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::UpstreamProfile(e) => AppError::BadGateway(e),
            ServiceError::AccountCreationFailed(e) => AppError::Conflict(anyhow::anyhow!(e)),
            ServiceError::SessionIssuanceFailed(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::InvalidSession(e) => AppError::Unauthorized(anyhow::anyhow!(e)),
            ServiceError::Persistence(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Delivery(e) => AppError::BadGateway(e),
            ServiceError::TokenMismatch => {
                AppError::Forbidden(anyhow::anyhow!("Invitation token does not match this account"))
            }
            ServiceError::TokenExpired => {
                AppError::BadRequest(anyhow::anyhow!("Invitation token has expired"))
            }
            ServiceError::UnknownAccount => {
                AppError::NotFound(anyhow::anyhow!("No account or provider link found"))
            }
        }
    }
}
