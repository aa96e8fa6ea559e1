//! HubSpot OAuth client.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AccessToken, CrmClient, CrmError, CrmProvider, RawProfile};
use crate::config::OAuthClientConfig;

const TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";
const TOKEN_INFO_URL: &str = "https://api.hubapi.com/oauth/v1/access-tokens";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct HubSpotClient {
    http: reqwest::Client,
    credentials: OAuthClientConfig,
}

impl HubSpotClient {
    pub fn new(http: reqwest::Client, credentials: OAuthClientConfig) -> Self {
        Self { http, credentials }
    }
}

#[async_trait]
impl CrmClient for HubSpotClient {
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
                provider: CrmProvider::HubSpot,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "HubSpot token exchange rejected");
            return Err(CrmError::UpstreamAuth {
                provider: CrmProvider::HubSpot,
                message: format!("token endpoint returned {}", status),
            });
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| CrmError::UpstreamAuth {
                provider: CrmProvider::HubSpot,
                message: format!("unreadable token response: {}", e),
            })?;

        Ok(AccessToken(token.access_token))
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<RawProfile, CrmError> {
        // HubSpot exposes the token owner's identity on the token-info
        // endpoint rather than a dedicated userinfo route.
        let response = self
            .http
            .get(format!("{}/{}", TOKEN_INFO_URL, token.0))
            .send()
            .await
            .map_err(|e| CrmError::UpstreamProfile {
                provider: CrmProvider::HubSpot,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CrmError::UpstreamProfile {
                provider: CrmProvider::HubSpot,
                message: format!("token info endpoint returned {}", status),
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| CrmError::UpstreamProfile {
                provider: CrmProvider::HubSpot,
                message: format!("unreadable profile response: {}", e),
            })?;

        let external_id = payload
            .get("user_id")
            .and_then(|v| v.as_i64())
            .map(|id| id.to_string())
            .ok_or_else(|| CrmError::UpstreamProfile {
                provider: CrmProvider::HubSpot,
                message: "profile response is missing user_id".to_string(),
            })?;

        let email = payload
            .get("user")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(RawProfile {
            external_id,
            email,
            name: None,
            snapshot: payload,
        })
    }
}
