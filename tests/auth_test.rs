// Integration tests for registration, login and role switching

use axum::http::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;
use xk_media_backend::models::Role;

mod common;
use common::{setup_test_app, unique_email, TEST_PASSWORD};

#[tokio::test]
#[serial]
async fn test_register_then_login() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let email = unique_email("advertiser");

    let registered = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "role": "advertiser",
            "company_name": "Coffee Co"
        }))
        .send()
        .await;
    assert_eq!(registered.status(), StatusCode::CREATED);
    let body: Value = registered.json().await;
    assert_eq!(body["data"]["role"], "advertiser");
    assert!(body["data"]["access_token"].is_string());
    assert!(body["data"]["user"].get("password_hash").is_none());

    let duplicate = app
        .post("/v1/auth/register")
        .json(&json!({ "email": email, "password": TEST_PASSWORD, "role": "venue" }))
        .send()
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let login = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .send()
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let body: Value = login.json().await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let me = app.get("/v1/account/me").bearer(&token).send().await;
    assert_eq!(me.status(), StatusCode::OK);
    let body: Value = me.json().await;
    assert_eq!(body["data"]["display_name"], "Coffee Co");

    let wrong = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": "not-the-password" }))
        .send()
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_admin_cannot_be_self_registered() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": unique_email("admin"),
            "password": TEST_PASSWORD,
            "role": "admin"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_switch_role_issues_new_token() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (_, token) = app.create_user(Role::Advertiser, "0").await;

    let response = app
        .post("/v1/account/role")
        .bearer(&token)
        .json(&json!({ "role": "venue" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["message"], "Role switched");
    assert_eq!(body["data"]["user"]["role"], "venue");

    let venue_token = body["data"]["access_token"].as_str().unwrap();
    let earnings = app.get("/v1/venue/earnings").bearer(venue_token).send().await;
    assert_eq!(earnings.status(), StatusCode::OK);

    let same = app
        .post("/v1/account/role")
        .bearer(venue_token)
        .json(&json!({ "role": "venue" }))
        .send()
        .await;
    let body: Value = same.json().await;
    assert_eq!(body["message"], "Role unchanged");
}

#[tokio::test]
#[serial]
async fn test_roles_cannot_reach_or_leave_admin() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (_, admin_token) = app.create_user(Role::Admin, "0").await;
    let (_, advertiser_token) = app.create_user(Role::Advertiser, "0").await;

    let leave = app
        .post("/v1/account/role")
        .bearer(&admin_token)
        .json(&json!({ "role": "advertiser" }))
        .send()
        .await;
    assert_eq!(leave.status(), StatusCode::FORBIDDEN);

    let reach = app
        .post("/v1/account/role")
        .bearer(&advertiser_token)
        .json(&json!({ "role": "admin" }))
        .send()
        .await;
    assert_eq!(reach.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_protected_routes_need_a_valid_token() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let missing = app.get("/v1/account/me").send().await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app.get("/v1/account/me").bearer("not.a.jwt").send().await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}
