mod common;

use common::TestApp;

#[tokio::test]
#[ignore] // requires Postgres at TEST_DATABASE_URL
async fn health_check_reports_healthy() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["postgres"], "up");
}

#[tokio::test]
#[ignore]
async fn unknown_provider_callback_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(format!(
            "{}/auth/salesforce/callback?code=abc&redirect_uri=http://localhost/cb",
            app.address
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn callback_without_code_is_a_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(format!(
            "{}/auth/hubspot/callback?code=&redirect_uri=http://localhost/cb",
            app.address
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}
