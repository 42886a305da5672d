// Integration tests for the OAuth handshake state token

use axum::http::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;
use xk_media_backend::{models::Role, services::OAuthStateService};

mod common;
use common::{setup_test_app, TestApp};

async fn issue(app: &TestApp, provider: &str, role: &str) -> String {
    let response = app
        .post(&format!("/v1/oauth/{}/state", provider))
        .json(&json!({ "role": role }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;
    assert!(body["data"]["expires_in"].as_u64().unwrap() > 0);
    body["data"]["state"].as_str().unwrap().to_string()
}

#[tokio::test]
#[serial]
async fn test_state_is_single_use() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let state = issue(&app, "yandex", "venue").await;

    let first = app
        .get(&format!("/v1/oauth/yandex/callback?state={}", state))
        .send()
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    let body: Value = first.json().await;
    assert_eq!(body["data"]["provider"], "yandex");
    assert_eq!(body["data"]["role"], "venue");

    let replay = app
        .get(&format!("/v1/oauth/yandex/callback?state={}", state))
        .send()
        .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_state_is_bound_to_provider() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let state = issue(&app, "vk", "advertiser").await;

    let elsewhere = app
        .get(&format!("/v1/oauth/google/callback?state={}", state))
        .send()
        .await;
    assert_eq!(elsewhere.status(), StatusCode::BAD_REQUEST);

    // The mismatched attempt burned the token
    let original = app
        .get(&format!("/v1/oauth/vk/callback?state={}", state))
        .send()
        .await;
    assert_eq!(original.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_unknown_state_and_provider() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let missing = app.get("/v1/oauth/yandex/callback").send().await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let forged = app
        .get("/v1/oauth/yandex/callback?state=never-issued")
        .send()
        .await;
    assert_eq!(forged.status(), StatusCode::BAD_REQUEST);

    let provider = app
        .post("/v1/oauth/myspace/state")
        .json(&json!({ "role": "advertiser" }))
        .send()
        .await;
    assert_eq!(provider.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_admin_role_cannot_be_requested() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let response = app
        .post("/v1/oauth/google/state")
        .json(&json!({ "role": Role::Admin }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_expired_state_is_refused_and_purged() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let short_lived = OAuthStateService::new(app.diesel_pool.clone(), 0);

    let expired = short_lived.issue("vk", Role::Venue).await.unwrap();
    assert_eq!(short_lived.consume("vk", &expired).await.unwrap(), None);

    short_lived.issue("vk", Role::Advertiser).await.unwrap();
    let purged = short_lived.purge_expired().await.unwrap();
    assert!(purged >= 1);
}
