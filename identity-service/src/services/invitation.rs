//! Invitation workflow: time-boxed tokens that, once redeemed, kick off the
//! OTP verification path for a team member's provider link.
//!
//! Tokens are stored hashed (SHA-256) and expiry is checked at redemption
//! time; there is no proactive sweep.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::error::ServiceError;
use crate::crm::CrmProvider;
use crate::db::LinkRepositories;
use crate::otp;
use crate::whatsapp::WhatsAppSender;

const DEFAULT_EXPIRY_HOURS: i64 = 168; // 7 days

/// Hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A freshly issued invitation, returned to the admin caller.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub token: String,
    pub expiry_utc: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InvitationService {
    links: Arc<LinkRepositories>,
    whatsapp: Arc<dyn WhatsAppSender>,
    otp_ttl_minutes: i64,
}

impl InvitationService {
    pub fn new(
        links: Arc<LinkRepositories>,
        whatsapp: Arc<dyn WhatsAppSender>,
        otp_ttl_minutes: i64,
    ) -> Self {
        Self {
            links,
            whatsapp,
            otp_ttl_minutes,
        }
    }

    /// Issue an invitation token for the account's provider link.
    pub async fn create(
        &self,
        provider: CrmProvider,
        account_id: Uuid,
        phone: &str,
        expires_in_hours: Option<i64>,
    ) -> Result<IssuedInvitation, ServiceError> {
        let token = Uuid::new_v4().to_string();
        let expiry_utc =
            Utc::now() + Duration::hours(expires_in_hours.unwrap_or(DEFAULT_EXPIRY_HOURS));

        let stored = self
            .links
            .for_provider(provider)
            .set_invitation(account_id, &hash_token(&token), phone, expiry_utc)
            .await?;
        if !stored {
            return Err(ServiceError::UnknownAccount);
        }

        tracing::info!(
            provider = %provider,
            account_id = %account_id,
            expiry_utc = %expiry_utc,
            "Invitation created"
        );

        Ok(IssuedInvitation { token, expiry_utc })
    }

    /// Redeem an invitation token on behalf of the authenticated account.
    ///
    /// `pending → accepted`; acceptance clears the token and issues a fresh
    /// OTP challenge in one statement. Delivery of that challenge is
    /// best-effort: the user can still request a code through the normal
    /// verification path.
    pub async fn accept(
        &self,
        provider: CrmProvider,
        token: &str,
        submitting_account: Uuid,
    ) -> Result<(), ServiceError> {
        let repo = self.links.for_provider(provider);

        let link = repo
            .find_by_invite_token_hash(&hash_token(token))
            .await?
            .ok_or(ServiceError::TokenMismatch)?;

        // Cross-account redemption is rejected before expiry is even looked
        // at; an attacker should not learn token freshness.
        if link.account_id != submitting_account {
            return Err(ServiceError::TokenMismatch);
        }

        if link.invite_is_expired(Utc::now()) {
            return Err(ServiceError::TokenExpired);
        }

        let phone = link
            .invite_phone
            .clone()
            .ok_or(ServiceError::TokenMismatch)?;

        let code = otp::generate();
        let expiry_utc = otp::expiry_from(Utc::now(), self.otp_ttl_minutes);

        repo.accept_invitation(link.link_id, &code, &phone, expiry_utc)
            .await?;

        tracing::info!(
            provider = %provider,
            account_id = %link.account_id,
            "Invitation accepted, OTP challenge issued"
        );

        if let Err(e) = self.whatsapp.send_otp(&phone, &code).await {
            tracing::warn!(
                account_id = %link.account_id,
                error = %e,
                "Invitation OTP delivery failed; acceptance stands"
            );
        }

        Ok(())
    }
}
