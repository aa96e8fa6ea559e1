//! Twilio WhatsApp dispatcher.
//!
//! Form POST against the Twilio Messages API with basic auth. Prefers a
//! provider-side content template (`ContentSid` + the code as a named
//! variable); when no content sid is configured it falls back to a plain-text
//! body with the code substituted into a fixed placeholder.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DispatchError, WhatsAppSender};
use crate::config::TwilioConfig;

const TWILIO_BASE_URL: &str = "https://api.twilio.com/2010-04-01";

/// Fallback body when no content template is configured.
const OTP_BODY_TEMPLATE: &str = "Your verification code is {{code}}. It expires in 10 minutes.";

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    message: Option<String>,
}

pub struct TwilioSender {
    config: TwilioConfig,
    http: reqwest::Client,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig, http: reqwest::Client) -> Result<Self, DispatchError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(DispatchError::Configuration(
                "TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN are not set".to_string(),
            ));
        }
        if config.from_number.is_empty() {
            return Err(DispatchError::Configuration(
                "TWILIO_FROM_NUMBER is not set".to_string(),
            ));
        }
        Ok(Self { config, http })
    }

    /// Twilio expects E.164: make sure the number carries a leading `+`.
    pub fn normalize_phone(phone: &str) -> String {
        let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.starts_with('+') {
            compact
        } else {
            format!("+{}", compact)
        }
    }

    async fn post_message(&self, form: Vec<(&str, String)>) -> Result<(), DispatchError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_BASE_URL, self.config.account_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DispatchError::Delivery(format!("Twilio unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<TwilioErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Twilio returned {}", status));
            tracing::error!(status = %status, error = %message, "Twilio send rejected");
            return Err(DispatchError::Delivery(message));
        }

        tracing::info!("WhatsApp message sent via Twilio");
        Ok(())
    }
}

#[async_trait]
impl WhatsAppSender for TwilioSender {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), DispatchError> {
        let to = format!("whatsapp:{}", Self::normalize_phone(phone));
        let from = format!("whatsapp:{}", Self::normalize_phone(&self.config.from_number));

        let mut form = vec![("To", to), ("From", from)];

        if self.config.content_sid.is_empty() {
            form.push(("Body", OTP_BODY_TEMPLATE.replace("{{code}}", code)));
        } else {
            form.push(("ContentSid", self.config.content_sid.clone()));
            form.push((
                "ContentVariables",
                serde_json::json!({ "code": code }).to_string(),
            ));
        }

        self.post_message(form).await
    }

    async fn send_welcome(&self, phone: &str) -> Result<(), DispatchError> {
        let to = format!("whatsapp:{}", Self::normalize_phone(phone));
        let from = format!("whatsapp:{}", Self::normalize_phone(&self.config.from_number));

        self.post_message(vec![
            ("To", to),
            ("From", from),
            ("Body", self.config.welcome_body.clone()),
        ])
        .await
    }

    fn variant(&self) -> &'static str {
        "twilio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_always_adds_leading_plus() {
        assert_eq!(TwilioSender::normalize_phone("3212345678"), "+3212345678");
        assert_eq!(TwilioSender::normalize_phone("+3212345678"), "+3212345678");
        assert_eq!(TwilioSender::normalize_phone("32 12 34 56 78"), "+3212345678");
    }

    #[test]
    fn otp_body_substitutes_code_placeholder() {
        let body = OTP_BODY_TEMPLATE.replace("{{code}}", "042137");
        assert!(body.contains("042137"));
        assert!(!body.contains("{{code}}"));
    }
}
