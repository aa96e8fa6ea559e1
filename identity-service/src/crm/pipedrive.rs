//! Pipedrive OAuth client.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AccessToken, CrmClient, CrmError, CrmProvider, RawProfile};
use crate::config::OAuthClientConfig;

const TOKEN_URL: &str = "https://oauth.pipedrive.com/oauth/token";
const ME_URL: &str = "https://api.pipedrive.com/v1/users/me";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct PipedriveClient {
    http: reqwest::Client,
    credentials: OAuthClientConfig,
}

impl PipedriveClient {
    pub fn new(http: reqwest::Client, credentials: OAuthClientConfig) -> Self {
        Self { http, credentials }
    }
}

#[async_trait]
impl CrmClient for PipedriveClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, CrmError> {
        // Pipedrive authenticates the app via HTTP basic auth on the token
        // endpoint instead of form credentials.
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| CrmError::UpstreamAuth {
                provider: CrmProvider::Pipedrive,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Pipedrive token exchange rejected");
            return Err(CrmError::UpstreamAuth {
                provider: CrmProvider::Pipedrive,
                message: format!("token endpoint returned {}", status),
            });
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| CrmError::UpstreamAuth {
                provider: CrmProvider::Pipedrive,
                message: format!("unreadable token response: {}", e),
            })?;

        Ok(AccessToken(token.access_token))
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<RawProfile, CrmError> {
        let response = self
            .http
            .get(ME_URL)
            .bearer_auth(&token.0)
            .send()
            .await
            .map_err(|e| CrmError::UpstreamProfile {
                provider: CrmProvider::Pipedrive,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CrmError::UpstreamProfile {
                provider: CrmProvider::Pipedrive,
                message: format!("users/me endpoint returned {}", status),
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| CrmError::UpstreamProfile {
                provider: CrmProvider::Pipedrive,
                message: format!("unreadable profile response: {}", e),
            })?;

        let data = payload.get("data").cloned().unwrap_or_default();

        let external_id = data
            .get("id")
            .and_then(|v| v.as_i64())
            .map(|id| id.to_string())
            .ok_or_else(|| CrmError::UpstreamProfile {
                provider: CrmProvider::Pipedrive,
                message: "profile response is missing data.id".to_string(),
            })?;

        let email = data
            .get("email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let name = data
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(RawProfile {
            external_id,
            email,
            name,
            snapshot: data,
        })
    }
}
