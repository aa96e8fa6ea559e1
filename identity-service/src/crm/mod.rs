//! CRM OAuth provider clients.
//!
//! Each supported CRM gets a [`CrmClient`] implementation performing the two
//! outbound calls of the login flow: authorization-code exchange and profile
//! fetch. Authorization codes are single-use, so neither call is ever retried.

pub mod hubspot;
pub mod pipedrive;
pub mod zoho;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hubspot::HubSpotClient;
pub use pipedrive::PipedriveClient;
pub use zoho::ZohoClient;

/// The fixed set of supported CRM identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrmProvider {
    HubSpot,
    Pipedrive,
    Zoho,
}

impl CrmProvider {
    pub const ALL: [CrmProvider; 3] = [
        CrmProvider::HubSpot,
        CrmProvider::Pipedrive,
        CrmProvider::Zoho,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrmProvider::HubSpot => "hubspot",
            CrmProvider::Pipedrive => "pipedrive",
            CrmProvider::Zoho => "zoho",
        }
    }

    /// Name of the provider-link table for this CRM.
    pub fn link_table(&self) -> &'static str {
        match self {
            CrmProvider::HubSpot => "hubspot_links",
            CrmProvider::Pipedrive => "pipedrive_links",
            CrmProvider::Zoho => "zoho_links",
        }
    }

    /// Stable placeholder email for providers that omit one, satisfying the
    /// uniqueness constraint on the account store.
    pub fn placeholder_email(&self, external_id: &str) -> String {
        format!("{}@{}.local", external_id, self.as_str())
    }
}

impl std::fmt::Display for CrmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CrmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hubspot" => Ok(CrmProvider::HubSpot),
            "pipedrive" => Ok(CrmProvider::Pipedrive),
            "zoho" => Ok(CrmProvider::Zoho),
            _ => Err(format!("Unknown CRM provider: {}", s)),
        }
    }
}

/// Access token returned by a provider's token endpoint.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

/// Raw profile data fetched from a provider's API.
#[derive(Debug, Clone)]
pub struct RawProfile {
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// The full upstream payload, persisted as the link's profile snapshot.
    pub snapshot: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum CrmError {
    /// The code exchange was rejected: bad code, mismatched redirect URI or
    /// revoked app credentials. 400-class, never retried.
    #[error("{provider} rejected the authorization code: {message}")]
    UpstreamAuth {
        provider: CrmProvider,
        message: String,
    },

    /// The profile fetch failed after a valid token. The token may already be
    /// partially consumed upstream, so this is fatal for the attempt.
    #[error("{provider} profile fetch failed: {message}")]
    UpstreamProfile {
        provider: CrmProvider,
        message: String,
    },
}

/// One external CRM's OAuth surface.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str)
        -> Result<AccessToken, CrmError>;

    /// Fetch the raw profile behind an access token.
    async fn fetch_profile(&self, token: &AccessToken) -> Result<RawProfile, CrmError>;
}
