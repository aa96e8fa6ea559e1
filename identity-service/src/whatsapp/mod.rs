//! WhatsApp dispatcher - pluggable OTP and welcome-message delivery.
//!
//! Two variants: the Meta WhatsApp Cloud API and Twilio. The factory selects
//! one from configuration at startup and fails fast when the selected
//! variant's credentials are missing. Delivery failures carry the upstream
//! message and are never swallowed here; only callers doing best-effort sends
//! (welcome, invitation) may log and continue.

pub mod meta;
pub mod twilio;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub use meta::MetaCloudSender;
pub use twilio::TwilioSender;

use crate::config::WhatsAppConfig;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("WhatsApp configuration error: {0}")]
    Configuration(String),

    #[error("Unknown WhatsApp provider: {0}")]
    UnknownProvider(String),

    #[error("WhatsApp delivery failed: {0}")]
    Delivery(String),
}

/// The delivery capability set used by verification and invitations.
#[async_trait]
pub trait WhatsAppSender: Send + Sync {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), DispatchError>;
    async fn send_welcome(&self, phone: &str) -> Result<(), DispatchError>;
    fn variant(&self) -> &'static str;
}

/// Build the active dispatcher from configuration.
///
/// Called once at startup; a missing credential or unknown variant name stops
/// the service before it accepts traffic.
pub fn build_sender(
    config: &WhatsAppConfig,
    http: reqwest::Client,
) -> Result<Arc<dyn WhatsAppSender>, DispatchError> {
    match config.provider.to_lowercase().as_str() {
        "meta" => Ok(Arc::new(MetaCloudSender::new(config.meta.clone(), http)?)),
        "twilio" => Ok(Arc::new(TwilioSender::new(config.twilio.clone(), http)?)),
        other => Err(DispatchError::UnknownProvider(other.to_string())),
    }
}

/// Mock dispatcher for tests: records sends instead of calling out.
pub struct MockWhatsAppSender {
    otp_count: AtomicU64,
    welcome_count: AtomicU64,
    fail_sends: bool,
}

impl MockWhatsAppSender {
    pub fn new() -> Self {
        Self {
            otp_count: AtomicU64::new(0),
            welcome_count: AtomicU64::new(0),
            fail_sends: false,
        }
    }

    /// A mock whose every send fails with a delivery error.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    pub fn otp_count(&self) -> u64 {
        self.otp_count.load(Ordering::SeqCst)
    }

    pub fn welcome_count(&self) -> u64 {
        self.welcome_count.load(Ordering::SeqCst)
    }
}

impl Default for MockWhatsAppSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhatsAppSender for MockWhatsAppSender {
    async fn send_otp(&self, phone: &str, _code: &str) -> Result<(), DispatchError> {
        if self.fail_sends {
            return Err(DispatchError::Delivery("mock send failure".to_string()));
        }
        self.otp_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(to = %phone, "[MOCK] OTP message would be sent");
        Ok(())
    }

    async fn send_welcome(&self, phone: &str) -> Result<(), DispatchError> {
        if self.fail_sends {
            return Err(DispatchError::Delivery("mock send failure".to_string()));
        }
        self.welcome_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(to = %phone, "[MOCK] welcome message would be sent");
        Ok(())
    }

    fn variant(&self) -> &'static str {
        "mock"
    }
}
