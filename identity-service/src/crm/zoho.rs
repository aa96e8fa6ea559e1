//! Zoho OAuth client.
//!
//! Zoho's token endpoint reports failures as a 200 with an `error` field in
//! the body, so success is decided on the payload, not the status code alone.

use async_trait::async_trait;

use super::{AccessToken, CrmClient, CrmError, CrmProvider, RawProfile};
use crate::config::OAuthClientConfig;

const TOKEN_URL: &str = "https://accounts.zoho.com/oauth/v2/token";
const USER_INFO_URL: &str = "https://accounts.zoho.com/oauth/user/info";

pub struct ZohoClient {
    http: reqwest::Client,
    credentials: OAuthClientConfig,
}

impl ZohoClient {
    pub fn new(http: reqwest::Client, credentials: OAuthClientConfig) -> Self {
        Self { http, credentials }
    }
}

#[async_trait]
impl CrmClient for ZohoClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, CrmError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", &self.credentials.client_id),
                ("client_secret", &self.credentials.client_secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| CrmError::UpstreamAuth {
                provider: CrmProvider::Zoho,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Zoho token exchange rejected");
            return Err(CrmError::UpstreamAuth {
                provider: CrmProvider::Zoho,
                message: format!("token endpoint returned {}", status),
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| CrmError::UpstreamAuth {
                provider: CrmProvider::Zoho,
                message: format!("unreadable token response: {}", e),
            })?;

        if let Some(err) = payload.get("error").and_then(|v| v.as_str()) {
            tracing::error!(error = %err, "Zoho token exchange rejected");
            return Err(CrmError::UpstreamAuth {
                provider: CrmProvider::Zoho,
                message: err.to_string(),
            });
        }

        let access_token = payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CrmError::UpstreamAuth {
                provider: CrmProvider::Zoho,
                message: "token response is missing access_token".to_string(),
            })?;

        Ok(AccessToken(access_token.to_string()))
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<RawProfile, CrmError> {
        let response = self
            .http
            .get(USER_INFO_URL)
            .header("Authorization", format!("Zoho-oauthtoken {}", token.0))
            .send()
            .await
            .map_err(|e| CrmError::UpstreamProfile {
                provider: CrmProvider::Zoho,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CrmError::UpstreamProfile {
                provider: CrmProvider::Zoho,
                message: format!("user info endpoint returned {}", status),
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| CrmError::UpstreamProfile {
                provider: CrmProvider::Zoho,
                message: format!("unreadable profile response: {}", e),
            })?;

        let external_id = payload
            .get("ZUID")
            .and_then(|v| {
                v.as_i64()
                    .map(|id| id.to_string())
                    .or_else(|| v.as_str().map(|s| s.to_string()))
            })
            .ok_or_else(|| CrmError::UpstreamProfile {
                provider: CrmProvider::Zoho,
                message: "profile response is missing ZUID".to_string(),
            })?;

        let email = payload
            .get("Email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let name = payload
            .get("Display_Name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(RawProfile {
            external_id,
            email,
            name,
            snapshot: payload,
        })
    }
}
