// Integration tests for the public per-screen content feed

use axum::http::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;
use xk_media_backend::models::{EquipmentType, NewTv, NewTvLink, Role, Tv, TvLink};

mod common;
use common::setup_test_app;

#[tokio::test]
#[serial]
async fn test_purchased_placement_appears_on_screen() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (venue, _) = app.create_user(Role::Venue, "0").await;
    let (_, token) = app.create_user(Role::Advertiser, "1000").await;
    let tv = app.create_tv(venue.id, Some("50")).await;

    let before = app.get(&format!("/v1/screens/{}", tv.code)).send().await;
    assert_eq!(before.status(), StatusCode::OK);
    let body: Value = before.json().await;
    assert_eq!(body["data"]["tv_id"], tv.id);
    assert!(body["data"]["links"].as_array().unwrap().is_empty());

    let purchase = app
        .post("/v1/subscriptions")
        .bearer(&token)
        .json(&json!({
            "tv_id": tv.id,
            "start_date": "2025-03-01",
            "end_date": "2025-03-31",
            "title": "Spring sale",
            "url": "https://shop.example.com/spring",
            "price": "300"
        }))
        .send()
        .await;
    assert_eq!(purchase.status(), StatusCode::CREATED);

    let after = app.get(&format!("/v1/screens/{}", tv.code)).send().await;
    assert_eq!(after.status(), StatusCode::OK);
    let body: Value = after.json().await;
    let links = body["data"]["links"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["title"], "Spring sale");
    assert_eq!(links[0]["url"], "https://shop.example.com/spring");
    assert!(links[0].get("advertiser_id").is_none());

    // The numeric id reaches the same screen
    let by_id = app.get(&format!("/v1/screens/{}", tv.id)).send().await;
    let body: Value = by_id.json().await;
    assert_eq!(body["data"]["tv_code"], tv.code.as_str());
}

#[tokio::test]
#[serial]
async fn test_feed_is_ordered_by_position_and_skips_inactive_links() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (venue, _) = app.create_user(Role::Venue, "0").await;
    let tv = app.create_tv(venue.id, Some("50")).await;

    {
        let mut conn = app.diesel_pool.get().await.unwrap();
        for (title, position, is_active) in [
            ("third", 3, true),
            ("hidden", 0, false),
            ("first", 1, true),
            ("second", 2, true),
        ] {
            TvLink::create(
                &mut conn,
                NewTvLink {
                    tv_id: tv.id,
                    advertiser_id: None,
                    advertiser_name: None,
                    title: title.to_string(),
                    url: format!("https://example.com/{}", title),
                    description: None,
                    position,
                    is_active,
                },
            )
            .await
            .unwrap();
        }
    }

    let response = app.get(&format!("/v1/screens/{}", tv.code)).send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    let titles: Vec<&str> = body["data"]["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|link| link["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
}

#[tokio::test]
#[serial]
async fn test_unknown_and_inactive_screens() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (venue, _) = app.create_user(Role::Venue, "0").await;

    let unknown = app.get("/v1/screens/no-such-screen").send().await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let body: Value = unknown.json().await;
    assert_eq!(body["kind"], "tv");

    let inactive = {
        let mut conn = app.diesel_pool.get().await.unwrap();
        let mut new_tv = NewTv::new(
            &format!("dark-{}", venue.id),
            "Switched off",
            Some(venue.id),
            EquipmentType::Venue,
        );
        new_tv.is_active = false;
        Tv::create(&mut conn, new_tv).await.unwrap()
    };

    let response = app
        .get(&format!("/v1/screens/{}", inactive.code))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
