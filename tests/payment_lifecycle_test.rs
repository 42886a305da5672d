// Integration tests for funding payments: creation, gateway webhooks,
// the legacy form notification and admin overrides.

use axum::http::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;
use xk_media_backend::{
    models::{NewPayment, Payment, PaymentError, PaymentStatus, Role, CURRENCY_RUB},
    services::{MockGateway, WebhookAck},
    utils::signature::{acknowledgement_digest, format_sum, notification_key},
};

mod common;
use common::{money, setup_test_app, setup_test_app_with, TestApp, LEGACY_SECRET};

async fn create_payment(app: &TestApp, token: &str, amount: &str) -> Value {
    let response = app
        .post("/v1/payments")
        .bearer(token)
        .json(&json!({ "purpose": "Top up for January campaign", "amount": amount }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await
}

async fn load_payment(app: &TestApp, payment_id: i32) -> Payment {
    let mut conn = app.diesel_pool.get().await.unwrap();
    Payment::find_by_id(&mut conn, payment_id)
        .await
        .unwrap()
        .unwrap()
}

fn success_webhook(gateway_id: &str, payment_id: i64) -> Value {
    json!({
        "type": "notification",
        "event": "payment.succeeded",
        "object": {
            "id": gateway_id,
            "status": "succeeded",
            "paid": true,
            "metadata": { "order_id": payment_id.to_string() }
        }
    })
}

#[tokio::test]
#[serial]
async fn test_webhook_redelivery_credits_once() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;

    let body = create_payment(&app, &token, "1000").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["payment"]["status"], "waiting");
    assert!(body["data"]["confirmation_url"].is_string());

    let gateway_id = body["data"]["payment"]["yk_payment_id"]
        .as_str()
        .unwrap()
        .to_string();
    let webhook = success_webhook(&gateway_id, payment_id);

    // The gateway is keyed by our own payment id and gets the receipt email
    let sent = app.gateway.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_id, payment_id.to_string());
    assert_eq!(sent[0].client_email.as_deref(), Some(advertiser.email.as_str()));

    let first = app
        .post("/v1/payments/yookassa/webhook")
        .json(&webhook)
        .send()
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    let ack: Value = first.json().await;
    assert_eq!(ack, json!({ "status": "ok" }));

    assert_eq!(app.balance_of(advertiser.id).await, money("1000.00"));
    let payment = load_payment(&app, payment_id as i32).await;
    assert_eq!(payment.status, PaymentStatus::Succeeded.as_str());
    assert!(payment.paid_at.is_some());

    let second = app
        .post("/v1/payments/yookassa/webhook")
        .json(&webhook)
        .send()
        .await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(app.balance_of(advertiser.id).await, money("1000.00"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_concurrent_webhook_deliveries_credit_once() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;

    let body = create_payment(&app, &token, "1000").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap();
    let gateway_id = body["data"]["payment"]["yk_payment_id"].as_str().unwrap();
    let raw = serde_json::to_vec(&success_webhook(gateway_id, payment_id)).unwrap();

    let deliveries: Vec<_> = (0..8)
        .map(|_| {
            let service = app.state.payment_service.clone();
            let raw = raw.clone();
            tokio::spawn(async move { service.handle_webhook(&raw).await })
        })
        .collect();

    for delivery in deliveries {
        assert_eq!(delivery.await.unwrap().unwrap(), WebhookAck::Processed);
    }

    assert_eq!(app.balance_of(advertiser.id).await, money("1000.00"));
    let payment = load_payment(&app, payment_id as i32).await;
    assert_eq!(payment.status, PaymentStatus::Succeeded.as_str());
}

#[tokio::test]
#[serial]
async fn test_webhook_with_long_gateway_id_is_credited() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;

    let body = create_payment(&app, &token, "250").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap();
    let long_id = format!("yk-{}", "f".repeat(200));

    let response = app
        .post("/v1/payments/yookassa/webhook")
        .json(&success_webhook(&long_id, payment_id))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.balance_of(advertiser.id).await, money("250.00"));
    let payment = load_payment(&app, payment_id as i32).await;
    assert_eq!(payment.yk_payment_id.as_deref(), Some(long_id.as_str()));
}

#[tokio::test]
#[serial]
async fn test_webhook_acknowledges_unknown_and_ignored_events() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let unknown = app
        .post("/v1/payments/yookassa/webhook")
        .json(&success_webhook("yk-missing", i32::MAX as i64))
        .send()
        .await;
    assert_eq!(unknown.status(), StatusCode::OK);
    let body: Value = unknown.json().await;
    assert_eq!(body["message"], "Payment not found");

    let ignored = app
        .post("/v1/payments/yookassa/webhook")
        .json(&json!({ "event": "payment.waiting_for_capture", "object": { "id": "x" } }))
        .send()
        .await;
    assert_eq!(ignored.status(), StatusCode::OK);
    let body: Value = ignored.json().await;
    assert_eq!(body["message"], "Event ignored");
}

#[tokio::test]
#[serial]
async fn test_webhook_rejects_malformed_input() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let garbage = app
        .post("/v1/payments/yookassa/webhook")
        .raw_json("{not json")
        .send()
        .await;
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

    let missing_order = app
        .post("/v1/payments/yookassa/webhook")
        .json(&json!({ "event": "payment.succeeded", "object": { "id": "yk-1", "status": "succeeded" } }))
        .send()
        .await;
    assert_eq!(missing_order.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_duplicate_order_id_is_rejected() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, _) = app.create_user(Role::Advertiser, "0").await;
    let mut conn = app.diesel_pool.get().await.unwrap();

    let order_id = format!("adv-{}-dupe0001", advertiser.id);
    let new_payment = || NewPayment {
        user_id: advertiser.id,
        amount: money("100.00"),
        currency: CURRENCY_RUB.to_string(),
        description: "duplicate".to_string(),
        order_id: order_id.clone(),
        status: PaymentStatus::Waiting.as_str().to_string(),
        paid_at: None,
    };

    Payment::create(&mut conn, new_payment()).await.unwrap();
    let second = Payment::create(&mut conn, new_payment()).await;
    assert!(matches!(second, Err(PaymentError::DuplicateOrderId(ref id)) if *id == order_id));
}

#[tokio::test]
#[serial]
async fn test_legacy_notification_with_bad_key_changes_nothing() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;
    let body = create_payment(&app, &token, "500").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap().to_string();

    let response = app
        .post("/v1/payments/paykeeper/notify")
        .form(&[
            ("id", "pk-777"),
            ("sum", "500.00"),
            ("clientid", "client"),
            ("orderid", &payment_id),
            ("key", "00000000000000000000000000000000"),
        ])
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await, "Error! Hash mismatch!");

    let payment = load_payment(&app, payment_id.parse().unwrap()).await;
    assert_eq!(payment.status, PaymentStatus::Waiting.as_str());
    assert_eq!(app.balance_of(advertiser.id).await, money("0"));
}

#[tokio::test]
#[serial]
async fn test_legacy_notification_with_valid_key_credits_once() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;
    let body = create_payment(&app, &token, "750").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap().to_string();

    let sum = format_sum("750").unwrap();
    let key = notification_key("pk-42", &sum, "client", &payment_id, LEGACY_SECRET);
    let fields = [
        ("id", "pk-42"),
        ("sum", "750"),
        ("clientid", "client"),
        ("orderid", payment_id.as_str()),
        ("key", key.as_str()),
        ("ps_id", "card"),
    ];

    for _ in 0..2 {
        let response = app.post("/v1/payments/paykeeper/notify").form(&fields).send().await;
        assert_eq!(
            response.text().await,
            format!("OK {}", acknowledgement_digest("pk-42", LEGACY_SECRET))
        );
    }

    assert_eq!(app.balance_of(advertiser.id).await, money("750.00"));
    let payment = load_payment(&app, payment_id.parse().unwrap()).await;
    assert_eq!(payment.status, PaymentStatus::Succeeded.as_str());
    assert_eq!(payment.pk_payment_id.as_deref(), Some("pk-42"));
    assert_eq!(payment.pk_ps_id.as_deref(), Some("card"));
}

#[tokio::test]
#[serial]
async fn test_admin_confirm_then_cancel_conflicts() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;
    let (_, admin_token) = app.create_user(Role::Admin, "0").await;
    let body = create_payment(&app, &token, "300").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap();

    let forbidden = app
        .post(&format!("/v1/admin/payments/{}/confirm", payment_id))
        .bearer(&token)
        .send()
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let confirmed = app
        .post(&format!("/v1/admin/payments/{}/confirm", payment_id))
        .bearer(&admin_token)
        .send()
        .await;
    assert_eq!(confirmed.status(), StatusCode::OK);
    assert_eq!(app.balance_of(advertiser.id).await, money("300.00"));

    let again = app
        .post(&format!("/v1/admin/payments/{}/confirm", payment_id))
        .bearer(&admin_token)
        .send()
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let cancel = app
        .post(&format!("/v1/admin/payments/{}/cancel", payment_id))
        .bearer(&admin_token)
        .send()
        .await;
    assert_eq!(cancel.status(), StatusCode::CONFLICT);
    assert_eq!(app.balance_of(advertiser.id).await, money("300.00"));
}

#[tokio::test]
#[serial]
async fn test_canceled_payment_is_never_credited_by_webhook() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;
    let (_, admin_token) = app.create_user(Role::Admin, "0").await;
    let body = create_payment(&app, &token, "200").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap();
    let gateway_id = body["data"]["payment"]["yk_payment_id"]
        .as_str()
        .unwrap()
        .to_string();

    let cancel = app
        .post(&format!("/v1/admin/payments/{}/cancel", payment_id))
        .bearer(&admin_token)
        .send()
        .await;
    assert_eq!(cancel.status(), StatusCode::OK);

    let webhook = app
        .post("/v1/payments/yookassa/webhook")
        .json(&success_webhook(&gateway_id, payment_id))
        .send()
        .await;
    assert_eq!(webhook.status(), StatusCode::OK);

    assert_eq!(app.balance_of(advertiser.id).await, money("0"));
    let payment = load_payment(&app, payment_id as i32).await;
    assert_eq!(payment.status, PaymentStatus::Canceled.as_str());
}

#[tokio::test]
#[serial]
async fn test_sync_applies_gateway_success() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;
    let (_, admin_token) = app.create_user(Role::Admin, "0").await;
    let body = create_payment(&app, &token, "450").await;
    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap();
    let gateway_id = body["data"]["payment"]["yk_payment_id"].as_str().unwrap();

    app.gateway.set_status(gateway_id, "succeeded");

    let response = app
        .post(&format!("/v1/admin/payments/{}/sync", payment_id))
        .bearer(&admin_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["data"]["credited"], true);
    assert_eq!(app.balance_of(advertiser.id).await, money("450.00"));
}

#[tokio::test]
#[serial]
async fn test_manual_top_up_credits_and_records_payment() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (advertiser, _) = app.create_user(Role::Advertiser, "100").await;
    let (_, admin_token) = app.create_user(Role::Admin, "0").await;

    let response = app
        .post(&format!("/v1/admin/users/{}/balance", advertiser.id))
        .bearer(&admin_token)
        .json(&json!({ "amount": "250.50" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;

    assert_eq!(body["data"]["payment"]["status"], "succeeded");
    assert!(body["data"]["payment"]["order_id"]
        .as_str()
        .unwrap()
        .starts_with("manual-"));
    assert_eq!(app.balance_of(advertiser.id).await, money("350.50"));

    let payment_id = body["data"]["payment"]["id"].clone();
    let listed: Value = app
        .get("/v1/admin/payments?status=succeeded")
        .bearer(&admin_token)
        .send()
        .await
        .json()
        .await;
    assert!(listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == payment_id));

    let stats = app
        .get("/v1/admin/payments/stats")
        .bearer(&admin_token)
        .send()
        .await;
    assert_eq!(stats.status(), StatusCode::OK);
    let stats: Value = stats.json().await;
    let month = money(stats["data"]["month_revenue"].as_str().unwrap());
    assert!(month >= money("250.50"));
}

#[tokio::test]
#[serial]
async fn test_payment_requires_positive_amount_and_advertiser() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (_, advertiser_token) = app.create_user(Role::Advertiser, "0").await;
    let (_, venue_token) = app.create_user(Role::Venue, "0").await;

    let zero = app
        .post("/v1/payments")
        .bearer(&advertiser_token)
        .json(&json!({ "purpose": "nothing", "amount": "0" }))
        .send()
        .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let venue = app
        .post("/v1/payments")
        .bearer(&venue_token)
        .json(&json!({ "purpose": "not mine", "amount": "10" }))
        .send()
        .await;
    assert_eq!(venue.status(), StatusCode::FORBIDDEN);

    let anonymous = app
        .post("/v1/payments")
        .json(&json!({ "purpose": "anon", "amount": "10" }))
        .send()
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_gateway_failure_keeps_payment_waiting() {
    let Some(app) = setup_test_app_with(MockGateway::failing()).await else {
        return;
    };
    let (advertiser, token) = app.create_user(Role::Advertiser, "0").await;

    let body = create_payment(&app, &token, "1000").await;
    assert_eq!(body["message"], "Payment saved; gateway unavailable");
    assert!(body["data"]["warning"].is_string());
    assert!(body["data"]["confirmation_url"].is_null());

    let payment_id = body["data"]["payment"]["id"].as_i64().unwrap();
    let payment = load_payment(&app, payment_id as i32).await;
    assert_eq!(payment.status, PaymentStatus::Waiting.as_str());
    assert!(payment.yk_payment_id.is_none());
    assert_eq!(app.balance_of(advertiser.id).await, money("0"));
}
