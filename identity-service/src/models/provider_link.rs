//! Provider link model - binds an external CRM identity to an Account.
//!
//! One row per (provider, external user id); the OTP challenge and the
//! invitation token live as embedded columns on the same row, so the account
//! id is the serialization key for every verification state change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Phone verification status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// No challenge outstanding and nothing verified yet.
    None,
    /// A challenge has been issued and awaits the code.
    Pending,
    /// The phone number has been verified.
    Active,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::None => "none",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Active => "active",
        }
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(VerificationStatus::None),
            "pending" => Ok(VerificationStatus::Pending),
            "active" => Ok(VerificationStatus::Active),
            _ => Err(format!("Invalid verification status: {}", s)),
        }
    }
}

/// Invitation state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteState {
    Pending,
    Accepted,
}

impl InviteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteState::Pending => "pending",
            InviteState::Accepted => "accepted",
        }
    }
}

/// Provider link entity. `account_id` is immutable after creation.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderLink {
    pub link_id: Uuid,
    pub external_user_id: String,
    pub account_id: Uuid,
    pub profile: serde_json::Value,
    pub otp_code: Option<String>,
    pub otp_phone: Option<String>,
    pub otp_expiry_utc: Option<DateTime<Utc>>,
    pub verification_status: String,
    pub verified_phone: Option<String>,
    pub invite_token_hash: Option<String>,
    pub invite_phone: Option<String>,
    pub invite_expiry_utc: Option<DateTime<Utc>>,
    pub invite_state: Option<String>,
    pub deleted_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// The outstanding OTP challenge embedded in a provider link row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub phone: String,
    pub expiry_utc: DateTime<Utc>,
}

impl ProviderLink {
    /// Project the embedded challenge, if one is outstanding.
    pub fn challenge(&self) -> Option<OtpChallenge> {
        match (&self.otp_code, &self.otp_phone, self.otp_expiry_utc) {
            (Some(code), Some(phone), Some(expiry_utc)) => Some(OtpChallenge {
                code: code.clone(),
                phone: phone.clone(),
                expiry_utc,
            }),
            _ => None,
        }
    }

    pub fn verification_status(&self) -> VerificationStatus {
        self.verification_status
            .parse()
            .unwrap_or(VerificationStatus::None)
    }

    /// Whether the embedded invitation is still redeemable at `now`.
    pub fn invite_is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.invite_expiry_utc {
            Some(expiry) => now >= expiry,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> ProviderLink {
        ProviderLink {
            link_id: Uuid::new_v4(),
            external_user_id: "42".to_string(),
            account_id: Uuid::new_v4(),
            profile: serde_json::json!({}),
            otp_code: None,
            otp_phone: None,
            otp_expiry_utc: None,
            verification_status: "none".to_string(),
            verified_phone: None,
            invite_token_hash: None,
            invite_phone: None,
            invite_expiry_utc: None,
            invite_state: None,
            deleted_utc: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn challenge_requires_all_three_fields() {
        let mut l = link();
        assert_eq!(l.challenge(), None);

        l.otp_code = Some("123456".to_string());
        l.otp_phone = Some("+3212345678".to_string());
        assert_eq!(l.challenge(), None);

        l.otp_expiry_utc = Some(Utc::now());
        assert!(l.challenge().is_some());
    }

    #[test]
    fn unknown_status_degrades_to_none() {
        let mut l = link();
        l.verification_status = "garbage".to_string();
        assert_eq!(l.verification_status(), VerificationStatus::None);
    }

    #[test]
    fn invite_without_expiry_counts_as_expired() {
        let l = link();
        assert!(l.invite_is_expired(Utc::now()));
    }
}
