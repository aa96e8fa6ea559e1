use axum::{
    Json,
    extract::{Path, Query, State},
};
use service_core::error::AppError;

use crate::AppState;
use crate::crm::CrmProvider;
use crate::dtos::{OAuthCallbackQuery, OAuthCallbackResponse};
use crate::services::ServiceError;

/// OAuth callback: exchange the authorization code, fetch the upstream
/// profile and resolve it to an account. Responds with the magic-link URL
/// the frontend redirects to.
#[tracing::instrument(skip(state, query), fields(provider = %provider))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Json<OAuthCallbackResponse>, AppError> {
    let provider: CrmProvider = provider
        .parse()
        .map_err(|e: String| AppError::NotFound(anyhow::anyhow!(e)))?;

    if query.code.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Authorization code must not be empty"
        )));
    }

    let client = state
        .crm
        .get(&provider)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Provider not configured")))?;

    let token = client
        .exchange_code(&query.code, &query.redirect_uri)
        .await
        .map_err(ServiceError::from)?;
    let profile = client
        .fetch_profile(&token)
        .await
        .map_err(ServiceError::from)?;

    let handle = state.identity.resolve(provider, profile).await?;

    Ok(Json(OAuthCallbackResponse {
        success: true,
        session_url: handle.session_url,
        account_id: handle.account_id,
    }))
}
