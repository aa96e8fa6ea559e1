//! Magic-link session issuance.
//!
//! Identity resolution ends with a single-use redirect URL carrying a signed,
//! short-lived token for the resolved account. Single-use bookkeeping on
//! redemption belongs to the redeeming frontend collaborator; this service
//! owns issuance and expiry. The same key verifies the bearer tokens used by
//! the invitation-accept endpoint.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ServiceError;
use crate::config::MagicLinkConfig;

/// Claims carried by a magic-link/session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id.
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// The redirect artifact handed back after identity resolution.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub account_id: Uuid,
    pub session_url: String,
}

pub trait SessionIssuer: Send + Sync {
    fn issue_magic_link(&self, account_id: Uuid, email: &str)
        -> Result<SessionHandle, ServiceError>;

    fn verify_bearer(&self, token: &str) -> Result<SessionClaims, ServiceError>;
}

/// HS256 implementation over the configured magic-link secret.
pub struct JwtSessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    base_url: String,
    ttl_minutes: i64,
}

impl JwtSessionIssuer {
    pub fn new(config: &MagicLinkConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ttl_minutes: config.ttl_minutes,
        }
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue_magic_link(
        &self,
        account_id: Uuid,
        email: &str,
    ) -> Result<SessionHandle, ServiceError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: account_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::SessionIssuanceFailed(e.to_string()))?;

        Ok(SessionHandle {
            account_id,
            session_url: format!("{}?token={}", self.base_url, token),
        })
    }

    fn verify_bearer(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ServiceError::InvalidSession(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> JwtSessionIssuer {
        JwtSessionIssuer::new(&MagicLinkConfig {
            secret: "a-test-secret-that-is-long-enough!!".to_string(),
            base_url: "http://localhost:3000/auth/session/".to_string(),
            ttl_minutes: 15,
        })
    }

    #[test]
    fn issued_link_round_trips_through_verify() {
        let issuer = issuer();
        let account_id = Uuid::new_v4();

        let handle = issuer.issue_magic_link(account_id, "a@b.example").unwrap();
        assert!(handle.session_url.starts_with("http://localhost:3000/auth/session?token="));

        let token = handle.session_url.split("token=").nth(1).unwrap();
        let claims = issuer.verify_bearer(token).unwrap();
        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.email, "a@b.example");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let issuer = issuer();
        let handle = issuer.issue_magic_link(Uuid::new_v4(), "a@b.example").unwrap();
        let token = handle.session_url.split("token=").nth(1).unwrap();
        let tampered = format!("{}x", token);
        assert!(issuer.verify_bearer(&tampered).is_err());
    }
}
