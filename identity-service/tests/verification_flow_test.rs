mod common;

use chrono::{Duration, Utc};
use common::{TestApp, unique_external_id};
use identity_service::crm::CrmProvider;
use identity_service::models::VerificationStatus;
use identity_service::otp::OtpRejection;
use identity_service::services::VerifyOutcome;
use uuid::Uuid;

const PHONE: &str = "+15550001234";

#[tokio::test]
#[ignore] // requires Postgres at TEST_DATABASE_URL
async fn send_and_verify_round_trip() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;
    let repo = app.links.for_provider(CrmProvider::HubSpot);

    app.state
        .verification
        .send_otp(CrmProvider::HubSpot, handle.account_id, PHONE)
        .await
        .unwrap();
    assert_eq!(app.whatsapp.otp_count(), 1);

    let link = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap();
    let code = link.otp_code.clone().expect("challenge should be stored");
    assert_eq!(code.len(), 6);
    assert_eq!(link.verification_status(), VerificationStatus::Pending);

    let outcome = app
        .state
        .verification
        .verify_otp(CrmProvider::HubSpot, handle.account_id, &code)
        .await
        .unwrap();
    assert_eq!(outcome, VerifyOutcome::Verified);
    assert_eq!(app.whatsapp.welcome_count(), 1);

    let link = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.verification_status(), VerificationStatus::Active);
    assert_eq!(link.verified_phone.as_deref(), Some(PHONE));
    assert!(link.otp_code.is_none(), "challenge must be consumed");
    assert!(link.otp_expiry_utc.is_none());
}

#[tokio::test]
#[ignore]
async fn wrong_code_is_rejected_without_consuming_the_challenge() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::Zoho, &unique_external_id()).await;
    let repo = app.links.for_provider(CrmProvider::Zoho);

    app.state
        .verification
        .send_otp(CrmProvider::Zoho, handle.account_id, PHONE)
        .await
        .unwrap();

    let code = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap()
        .otp_code
        .unwrap();
    let wrong = if code == "000000" { "000001" } else { "000000" };

    let outcome = app
        .state
        .verification
        .verify_otp(CrmProvider::Zoho, handle.account_id, wrong)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        VerifyOutcome::Rejected(OtpRejection::IncorrectCode)
    );

    // The right code still works afterwards.
    let outcome = app
        .state
        .verification
        .verify_otp(CrmProvider::Zoho, handle.account_id, &code)
        .await
        .unwrap();
    assert_eq!(outcome, VerifyOutcome::Verified);
}

#[tokio::test]
#[ignore]
async fn expired_challenge_is_rejected_even_with_the_right_code() {
    let app = TestApp::spawn().await;
    let handle = app
        .resolve(CrmProvider::Pipedrive, &unique_external_id())
        .await;
    let repo = app.links.for_provider(CrmProvider::Pipedrive);

    // Plant an already-expired challenge directly.
    repo.store_challenge(
        handle.account_id,
        PHONE,
        "123456",
        Utc::now() - Duration::minutes(1),
    )
    .await
    .unwrap();

    let outcome = app
        .state
        .verification
        .verify_otp(CrmProvider::Pipedrive, handle.account_id, "123456")
        .await
        .unwrap();
    assert_eq!(outcome, VerifyOutcome::Rejected(OtpRejection::Expired));
}

#[tokio::test]
#[ignore]
async fn stale_resubmission_after_success_is_rejected() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;
    let repo = app.links.for_provider(CrmProvider::HubSpot);

    app.state
        .verification
        .send_otp(CrmProvider::HubSpot, handle.account_id, PHONE)
        .await
        .unwrap();
    let code = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap()
        .otp_code
        .unwrap();

    let first = app
        .state
        .verification
        .verify_otp(CrmProvider::HubSpot, handle.account_id, &code)
        .await
        .unwrap();
    assert_eq!(first, VerifyOutcome::Verified);

    // Consumed challenge: the same code must not verify twice.
    let second = app
        .state
        .verification
        .verify_otp(CrmProvider::HubSpot, handle.account_id, &code)
        .await
        .unwrap();
    assert_eq!(
        second,
        VerifyOutcome::Rejected(OtpRejection::IncorrectCode)
    );
}

#[tokio::test]
#[ignore]
async fn resend_overwrites_the_outstanding_challenge() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::Zoho, &unique_external_id()).await;
    let repo = app.links.for_provider(CrmProvider::Zoho);

    // Plant a known first challenge, then send a real second one.
    repo.store_challenge(
        handle.account_id,
        PHONE,
        "111111",
        Utc::now() + Duration::minutes(10),
    )
    .await
    .unwrap();

    app.state
        .verification
        .send_otp(CrmProvider::Zoho, handle.account_id, PHONE)
        .await
        .unwrap();

    let second = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap()
        .otp_code
        .unwrap();

    if second != "111111" {
        let outcome = app
            .state
            .verification
            .verify_otp(CrmProvider::Zoho, handle.account_id, "111111")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Rejected(OtpRejection::IncorrectCode)
        );
    }
}

#[tokio::test]
#[ignore]
async fn consume_is_conditional_on_the_stored_code() {
    let app = TestApp::spawn().await;
    let handle = app
        .resolve(CrmProvider::Pipedrive, &unique_external_id())
        .await;
    let repo = app.links.for_provider(CrmProvider::Pipedrive);

    repo.store_challenge(
        handle.account_id,
        PHONE,
        "111111",
        Utc::now() + Duration::minutes(10),
    )
    .await
    .unwrap();

    // A consume carrying a code that no longer matches the stored challenge
    // must not apply, and must leave the challenge intact.
    let marked = repo
        .mark_verified(handle.account_id, PHONE, "222222")
        .await
        .unwrap();
    assert!(!marked);

    let link = repo
        .find_by_account_id(handle.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.otp_code.as_deref(), Some("111111"));
    assert_eq!(link.verification_status(), VerificationStatus::Pending);

    let marked = repo
        .mark_verified(handle.account_id, PHONE, "111111")
        .await
        .unwrap();
    assert!(marked);
}

#[tokio::test]
#[ignore]
async fn send_to_unknown_account_is_an_error() {
    let app = TestApp::spawn().await;

    let result = app
        .state
        .verification
        .send_otp(CrmProvider::HubSpot, Uuid::new_v4(), PHONE)
        .await;
    assert!(result.is_err());
    assert_eq!(app.whatsapp.otp_count(), 0, "nothing may be sent");
}

#[tokio::test]
#[ignore]
async fn verify_endpoint_reports_rejection_reason() {
    let app = TestApp::spawn().await;
    let handle = app.resolve(CrmProvider::HubSpot, &unique_external_id()).await;

    app.state
        .verification
        .send_otp(CrmProvider::HubSpot, handle.account_id, PHONE)
        .await
        .unwrap();

    let response = app
        .client()
        .post(format!("{}/verification/verify", app.address))
        .json(&serde_json::json!({
            "provider": "hubspot",
            "account_id": handle.account_id,
            "code": "999999999"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "incorrect_code");
}
