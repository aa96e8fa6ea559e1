//! Meta WhatsApp Cloud API dispatcher.
//!
//! Sends pre-approved message templates through
//! `https://graph.facebook.com/v19.0/{phone_number_id}/messages` with
//! bearer-token authentication. The OTP template takes the code as its single
//! body parameter.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{DispatchError, WhatsAppSender};
use crate::config::MetaCloudConfig;

const GRAPH_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Error envelope returned by the Graph API.
#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

pub struct MetaCloudSender {
    config: MetaCloudConfig,
    http: reqwest::Client,
}

impl MetaCloudSender {
    pub fn new(config: MetaCloudConfig, http: reqwest::Client) -> Result<Self, DispatchError> {
        if config.access_token.is_empty() {
            return Err(DispatchError::Configuration(
                "META_WA_ACCESS_TOKEN is not set".to_string(),
            ));
        }
        if config.phone_number_id.is_empty() {
            return Err(DispatchError::Configuration(
                "META_WA_PHONE_NUMBER_ID is not set".to_string(),
            ));
        }
        if config.otp_template.is_empty() || config.welcome_template.is_empty() {
            return Err(DispatchError::Configuration(
                "Meta template names are not set".to_string(),
            ));
        }
        Ok(Self { config, http })
    }

    /// Meta expects digits only: whitespace and the leading `+` are stripped.
    pub fn normalize_phone(phone: &str) -> String {
        let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
        compact.strip_prefix('+').unwrap_or(&compact).to_string()
    }

    async fn send_template(
        &self,
        phone: &str,
        template: &str,
        body_parameter: Option<&str>,
    ) -> Result<(), DispatchError> {
        let url = format!(
            "{}/{}/messages",
            GRAPH_BASE_URL, self.config.phone_number_id
        );

        let mut template_payload = json!({
            "name": template,
            "language": { "code": self.config.template_language },
        });
        if let Some(param) = body_parameter {
            template_payload["components"] = json!([{
                "type": "body",
                "parameters": [{ "type": "text", "text": param }],
            }]);
        }

        let body = json!({
            "messaging_product": "whatsapp",
            "to": Self::normalize_phone(phone),
            "type": "template",
            "template": template_payload,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::Delivery(format!("Cloud API unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<GraphErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("Cloud API returned {}", status));
            tracing::error!(status = %status, error = %message, "Meta template send rejected");
            return Err(DispatchError::Delivery(message));
        }

        tracing::info!(template = %template, "WhatsApp template sent via Meta Cloud API");
        Ok(())
    }
}

#[async_trait]
impl WhatsAppSender for MetaCloudSender {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), DispatchError> {
        self.send_template(phone, &self.config.otp_template, Some(code))
            .await
    }

    async fn send_welcome(&self, phone: &str) -> Result<(), DispatchError> {
        self.send_template(phone, &self.config.welcome_template, None)
            .await
    }

    fn variant(&self) -> &'static str {
        "meta"
    }
}
