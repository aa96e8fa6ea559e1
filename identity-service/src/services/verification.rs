//! Phone verification orchestration: issue, deliver and consume OTP
//! challenges.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ServiceError;
use crate::crm::CrmProvider;
use crate::db::LinkRepositories;
use crate::otp::{self, OtpRejection};
use crate::whatsapp::WhatsAppSender;

/// Outcome of an OTP verification attempt. Rejections are expected results,
/// not errors: the client needs the reason to decide between "resend" and
/// "re-enter".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Rejected(OtpRejection),
}

#[derive(Clone)]
pub struct VerificationService {
    links: Arc<LinkRepositories>,
    whatsapp: Arc<dyn WhatsAppSender>,
    otp_ttl_minutes: i64,
}

impl VerificationService {
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

    /// Issue a fresh challenge for the account and deliver it. Overwrites any
    /// outstanding challenge; a delivery rejection is fatal for this attempt
    /// (the user can request a new code).
    pub async fn send_otp(
        &self,
        provider: CrmProvider,
        account_id: Uuid,
        phone: &str,
    ) -> Result<chrono::DateTime<Utc>, ServiceError> {
        let code = otp::generate();
        let expiry_utc = otp::expiry_from(Utc::now(), self.otp_ttl_minutes);

        let stored = self
            .links
            .for_provider(provider)
            .store_challenge(account_id, phone, &code, expiry_utc)
            .await?;
        if !stored {
            return Err(ServiceError::UnknownAccount);
        }

        self.whatsapp.send_otp(phone, &code).await?;

        tracing::info!(
            provider = %provider,
            account_id = %account_id,
            expiry_utc = %expiry_utc,
            "OTP challenge issued"
        );

        Ok(expiry_utc)
    }

    /// Check a submitted code against the outstanding challenge and, on
    /// success, atomically record the verified phone.
    ///
    /// A consumed or never-issued challenge is reported as an incorrect code,
    /// so a stale resubmission can never observe stale success.
    pub async fn verify_otp(
        &self,
        provider: CrmProvider,
        account_id: Uuid,
        submitted_code: &str,
    ) -> Result<VerifyOutcome, ServiceError> {
        let repo = self.links.for_provider(provider);

        let challenge = match repo.get_challenge(account_id).await? {
            Some(c) => c,
            None => return Ok(VerifyOutcome::Rejected(OtpRejection::IncorrectCode)),
        };

        if let Err(rejection) = otp::validate(&challenge, submitted_code, Utc::now()) {
            tracing::info!(
                provider = %provider,
                account_id = %account_id,
                reason = rejection.as_str(),
                "OTP verification rejected"
            );
            return Ok(VerifyOutcome::Rejected(rejection));
        }

        // The single atomic transition point. Success may only be reported
        // after this lands; a concurrent resend between the read above and
        // this update leaves the new challenge untouched and rejects the
        // now-stale code.
        let marked = repo
            .mark_verified(account_id, &challenge.phone, &challenge.code)
            .await?;
        if !marked {
            return Ok(VerifyOutcome::Rejected(OtpRejection::IncorrectCode));
        }

        tracing::info!(
            provider = %provider,
            account_id = %account_id,
            "Phone number verified"
        );

        // Best-effort welcome message; verification already stands.
        if let Err(e) = self.whatsapp.send_welcome(&challenge.phone).await {
            tracing::warn!(
                account_id = %account_id,
                error = %e,
                "Welcome message delivery failed"
            );
        }

        Ok(VerifyOutcome::Verified)
    }
}
