pub mod config;
pub mod crm;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod otp;
pub mod services;
pub mod whatsapp;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::{IpRateLimiter, ip_rate_limit_middleware};
use service_core::middleware::tracing::request_id_middleware;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::IdentityConfig;
use crate::crm::{CrmClient, CrmProvider, HubSpotClient, PipedriveClient, ZohoClient};
use crate::db::{AccountRepository, LinkRepositories};
use crate::services::{
    IdentityService, InvitationService, JwtSessionIssuer, SessionIssuer, VerificationService,
};
use crate::whatsapp::WhatsAppSender;

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub pool: sqlx::PgPool,
    pub crm: Arc<HashMap<CrmProvider, Arc<dyn CrmClient>>>,
    pub sessions: Arc<dyn SessionIssuer>,
    pub identity: IdentityService,
    pub verification: VerificationService,
    pub invitations: InvitationService,
    pub otp_send_rate_limiter: IpRateLimiter,
    pub callback_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every component from configuration, an open pool and the chosen
    /// WhatsApp dispatcher. Shared by the binary and the integration harness,
    /// which injects a mock dispatcher here.
    pub fn build(
        config: IdentityConfig,
        pool: sqlx::PgPool,
        http: reqwest::Client,
        whatsapp: Arc<dyn WhatsAppSender>,
    ) -> Self {
        let accounts = AccountRepository::new(pool.clone());
        let links = Arc::new(LinkRepositories::new(pool.clone()));

        let mut crm: HashMap<CrmProvider, Arc<dyn CrmClient>> = HashMap::new();
        crm.insert(
            CrmProvider::HubSpot,
            Arc::new(HubSpotClient::new(http.clone(), config.oauth.hubspot.clone())),
        );
        crm.insert(
            CrmProvider::Pipedrive,
            Arc::new(PipedriveClient::new(http.clone(), config.oauth.pipedrive.clone())),
        );
        crm.insert(
            CrmProvider::Zoho,
            Arc::new(ZohoClient::new(http, config.oauth.zoho.clone())),
        );

        let sessions: Arc<dyn SessionIssuer> = Arc::new(JwtSessionIssuer::new(&config.magic_link));

        let identity = IdentityService::new(accounts, links.clone(), sessions.clone());
        let verification =
            VerificationService::new(links.clone(), whatsapp.clone(), config.otp.ttl_minutes);
        let invitations = InvitationService::new(links, whatsapp, config.otp.ttl_minutes);

        let otp_send_rate_limiter = service_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.otp_send_attempts,
            config.rate_limit.otp_send_window_seconds,
        );
        let callback_rate_limiter = service_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.callback_attempts,
            config.rate_limit.callback_window_seconds,
        );
        let ip_rate_limiter = service_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
        );

        AppState {
            config,
            pool,
            crm: Arc::new(crm),
            sessions,
            identity,
            verification,
            invitations,
            otp_send_rate_limiter,
            callback_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // The callback is hit by browser redirects; the send endpoint is the
    // abuse-prone one. Each gets its own per-IP budget.
    let callback_route = Router::new()
        .route("/auth/:provider/callback", get(handlers::oauth::oauth_callback))
        .layer(from_fn_with_state(
            state.callback_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let otp_send_route = Router::new()
        .route("/verification/send", post(handlers::verification::send_otp))
        .layer(from_fn_with_state(
            state.otp_send_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let cors_origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(health_check))
        .merge(callback_route)
        .merge(otp_send_route)
        .route("/verification/verify", post(handlers::verification::verify_otp))
        .route("/invitations", post(handlers::invitation::create_invitation))
        .route("/invitations/accept", post(handlers::invitation::accept_invitation))
        .with_state(state)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static("x-admin-api-key"),
                ]),
        )
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::health_check(&state.pool).await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "postgres": "up"
        }
    })))
}
