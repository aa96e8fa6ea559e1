mod common;

use chrono::{Duration, Utc};
use common::{TEST_ADMIN_KEY, TestApp, unique_external_id};
use identity_service::crm::CrmProvider;
use identity_service::models::InviteState;
use identity_service::services::ServiceError;
use identity_service::services::invitation::hash_token;
use uuid::Uuid;

const PHONE: &str = "+15550009876";

#[tokio::test]
#[ignore] // requires Postgres at TEST_DATABASE_URL
async fn accepted_invitation_issues_an_otp_challenge() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;
    let repo = app.links.for_provider(CrmProvider::HubSpot);

    let issued = app
        .state
        .invitations
        .create(CrmProvider::HubSpot, handle.account_id, PHONE, None)
        .await
        .unwrap();
    assert!(issued.expiry_utc > Utc::now());

    let link = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        link.invite_token_hash.as_deref(),
        Some(hash_token(&issued.token).as_str()),
        "only the hash may be stored"
    );
    assert_eq!(link.invite_state.as_deref(), Some(InviteState::Pending.as_str()));

    app.state
        .invitations
        .accept(CrmProvider::HubSpot, &issued.token, handle.account_id)
        .await
        .unwrap();

    let link = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.invite_state.as_deref(), Some(InviteState::Accepted.as_str()));
    assert!(link.invite_token_hash.is_none(), "token must be cleared");
    assert!(link.otp_code.is_some(), "acceptance issues a challenge");
    assert_eq!(app.whatsapp.otp_count(), 1);
}

#[tokio::test]
#[ignore]
async fn expired_invitation_is_rejected_and_issues_nothing() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::Zoho, &unique_external_id()).await;
    let repo = app.links.for_provider(CrmProvider::Zoho);

    let token = Uuid::new_v4().to_string();
    repo.set_invitation(
        handle.account_id,
        &hash_token(&token),
        PHONE,
        Utc::now() - Duration::hours(1),
    )
    .await
    .unwrap();

    let err = app
        .state
        .invitations
        .accept(CrmProvider::Zoho, &token, handle.account_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenExpired));

    let link = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap();
    assert!(link.otp_code.is_none(), "expired acceptance must not issue a challenge");
    assert_eq!(app.whatsapp.otp_count(), 0);
}

#[tokio::test]
#[ignore]
async fn invitation_for_another_account_is_rejected() {
    let app = TestApp::spawn().await;
    let invited = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;
    let other = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;

    let issued = app
        .state
        .invitations
        .create(CrmProvider::HubSpot, invited.account_id, PHONE, None)
        .await
        .unwrap();

    let err = app
        .state
        .invitations
        .accept(CrmProvider::HubSpot, &issued.token, other.account_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenMismatch));
}

#[tokio::test]
#[ignore]
async fn unknown_token_is_rejected() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::Pipedrive, &unique_external_id()).await;

    let err = app
        .state
        .invitations
        .accept(CrmProvider::Pipedrive, "never-issued", handle.account_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenMismatch));
}

#[tokio::test]
#[ignore]
async fn create_endpoint_requires_the_admin_key() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;

    let body = serde_json::json!({
        "provider": "hubspot",
        "account_id": handle.account_id,
        "phone": PHONE
    });

    let response = app
        .client()
        .post(format!("{}/invitations", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = app
        .client()
        .post(format!("{}/invitations", app.address))
        .header("x-admin-api-key", TEST_ADMIN_KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["invite_token"].as_str().is_some());
}

#[tokio::test]
#[ignore]
async fn accept_endpoint_requires_a_valid_session() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;

    let issued = app
        .state
        .invitations
        .create(CrmProvider::HubSpot, handle.account_id, PHONE, None)
        .await
        .unwrap();

    let body = serde_json::json!({ "token": issued.token, "provider": "hubspot" });

    // No bearer token.
    let response = app
        .client()
        .post(format!("{}/invitations/accept", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Bearer token straight off the magic link.
    let bearer = handle
        .session_url
        .split("token=")
        .nth(1)
        .unwrap()
        .to_string();
    let response = app
        .client()
        .post(format!("{}/invitations/accept", app.address))
        .header("authorization", format!("Bearer {}", bearer))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}
