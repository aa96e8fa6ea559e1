use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Immutable service configuration, assembled once at startup and passed
/// explicitly into every component constructor.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub oauth: OAuthProvidersConfig,
    pub whatsapp: WhatsAppConfig,
    pub otp: OtpConfig,
    pub magic_link: MagicLinkConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub http: HttpClientConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// OAuth client credentials, one set per supported CRM.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProvidersConfig {
    pub hubspot: OAuthClientConfig,
    pub pipedrive: OAuthClientConfig,
    pub zoho: OAuthClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// WhatsApp delivery configuration. `provider` selects the active variant;
/// the factory validates that the selected variant's credentials are set.
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    pub provider: String,
    pub meta: MetaCloudConfig,
    pub twilio: TwilioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaCloudConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub otp_template: String,
    pub welcome_template: String,
    pub template_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    /// Twilio content template sid. When empty the dispatcher falls back to
    /// a plain-text body with the code substituted in.
    pub content_sid: String,
    pub welcome_body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkConfig {
    pub secret: String,
    pub base_url: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub admin_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub otp_send_attempts: u32,
    pub otp_send_window_seconds: u64,
    pub callback_attempts: u32,
    pub callback_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    pub outbound_timeout_seconds: u64,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = IdentityConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            oauth: OAuthProvidersConfig {
                hubspot: OAuthClientConfig {
                    client_id: get_env("HUBSPOT_CLIENT_ID", None, is_prod)?,
                    client_secret: get_env("HUBSPOT_CLIENT_SECRET", None, is_prod)?,
                },
                pipedrive: OAuthClientConfig {
                    client_id: get_env("PIPEDRIVE_CLIENT_ID", None, is_prod)?,
                    client_secret: get_env("PIPEDRIVE_CLIENT_SECRET", None, is_prod)?,
                },
                zoho: OAuthClientConfig {
                    client_id: get_env("ZOHO_CLIENT_ID", None, is_prod)?,
                    client_secret: get_env("ZOHO_CLIENT_SECRET", None, is_prod)?,
                },
            },
            whatsapp: WhatsAppConfig {
                provider: get_env("WHATSAPP_PROVIDER", Some("meta"), is_prod)?,
                // Variant credentials are validated by the dispatcher factory
                // against the selected provider, so the unselected variant may
                // stay empty even in production.
                meta: MetaCloudConfig {
                    access_token: get_env("META_WA_ACCESS_TOKEN", Some(""), false)?,
                    phone_number_id: get_env("META_WA_PHONE_NUMBER_ID", Some(""), false)?,
                    otp_template: get_env("META_WA_OTP_TEMPLATE", Some("otp_code"), false)?,
                    welcome_template: get_env("META_WA_WELCOME_TEMPLATE", Some("welcome"), false)?,
                    template_language: get_env("META_WA_TEMPLATE_LANGUAGE", Some("en"), false)?,
                },
                twilio: TwilioConfig {
                    account_sid: get_env("TWILIO_ACCOUNT_SID", Some(""), false)?,
                    auth_token: get_env("TWILIO_AUTH_TOKEN", Some(""), false)?,
                    from_number: get_env("TWILIO_FROM_NUMBER", Some(""), false)?,
                    content_sid: get_env("TWILIO_CONTENT_SID", Some(""), false)?,
                    welcome_body: get_env(
                        "TWILIO_WELCOME_BODY",
                        Some("Welcome! Your WhatsApp number is now verified."),
                        false,
                    )?,
                },
            },
            otp: OtpConfig {
                ttl_minutes: parse_env("OTP_TTL_MINUTES", "10", is_prod)?,
            },
            magic_link: MagicLinkConfig {
                secret: get_env("MAGIC_LINK_SECRET", None, is_prod)?,
                base_url: get_env(
                    "MAGIC_LINK_BASE_URL",
                    Some("http://localhost:3000/auth/session"),
                    is_prod,
                )?,
                ttl_minutes: parse_env("MAGIC_LINK_TTL_MINUTES", "15", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                admin_api_key: get_env("ADMIN_API_KEY", None, is_prod)?,
            },
            rate_limit: RateLimitConfig {
                otp_send_attempts: parse_env("RATE_LIMIT_OTP_SEND_ATTEMPTS", "5", is_prod)?,
                otp_send_window_seconds: parse_env(
                    "RATE_LIMIT_OTP_SEND_WINDOW_SECONDS",
                    "900",
                    is_prod,
                )?,
                callback_attempts: parse_env("RATE_LIMIT_CALLBACK_ATTEMPTS", "10", is_prod)?,
                callback_window_seconds: parse_env(
                    "RATE_LIMIT_CALLBACK_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
            },
            http: HttpClientConfig {
                outbound_timeout_seconds: parse_env("OUTBOUND_TIMEOUT_SECONDS", "10", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.otp.ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OTP_TTL_MINUTES must be positive"
            )));
        }

        if self.magic_link.ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAGIC_LINK_TTL_MINUTES must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.magic_link.secret.len() < 32 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MAGIC_LINK_SECRET must be at least 32 bytes in production"
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?.parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(format!("{} is not valid: {}", key, e)))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mandatory_var_reports_dev_wording_outside_prod() {
        let err = get_env("IDENTITY_TEST_UNSET_VAR", None, false)
            .err()
            .unwrap();
        let message = err.to_string();
        assert!(message.contains("required but not set"));
        assert!(!message.contains("in production"));
    }

    #[test]
    fn missing_var_reports_prod_wording_in_prod() {
        let err = get_env("IDENTITY_TEST_UNSET_VAR", None, true)
            .err()
            .unwrap();
        assert!(err.to_string().contains("required in production"));
    }

    #[test]
    fn default_applies_outside_prod_only() {
        assert_eq!(
            get_env("IDENTITY_TEST_UNSET_VAR", Some("fallback"), false).unwrap(),
            "fallback"
        );
        assert!(get_env("IDENTITY_TEST_UNSET_VAR", Some("fallback"), true).is_err());
    }
}
