use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::integration::common::{ALICE_TOKEN, BOB_TOKEN, seed_value, setup_test_app};

async fn send(
    router: &Router,
    request: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn authed(token: &str, request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header("authorization", format!("Bearer {token}"))
}

fn watch_body(name: &str, period_seconds: i64) -> Body {
    Body::from(
        serde_json::to_vec(&serde_json::json!({
            "name": name,
            "url": "https://example.com/releases",
            "xpath": "//*[@class='version']/text()",
            "period_seconds": period_seconds,
        }))
        .unwrap(),
    )
}

async fn create_watch(router: &Router, token: &str) -> serde_json::Value {
    let (status, json) = send(
        router,
        authed(token, Request::post("/v1/watches"))
            .header("content-type", "application/json")
            .body(watch_body("releases", 1800))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = send(
        &app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let (status, json) = send(
        &app.router,
        Request::get("/v1/watches").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn unknown_token_returns_401() {
    let app = setup_test_app().await;

    let (status, _) = send(
        &app.router,
        authed("wrong-token", Request::get("/v1/watches"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_watch_schedules_first_check_one_period_out() {
    let app = setup_test_app().await;

    let before = Utc::now();
    let json = create_watch(&app.router, ALICE_TOKEN).await;
    let after = Utc::now();

    assert_eq!(json["name"], "releases");
    assert_eq!(json["period_seconds"], 1800);

    let next_check: chrono::DateTime<Utc> =
        json["next_check"].as_str().unwrap().parse().unwrap();
    let period = TimeDelta::seconds(1800);
    // Storage keeps microseconds, so allow a hair of slack at each bound.
    assert!(next_check >= before + period - TimeDelta::milliseconds(1));
    assert!(next_check <= after + period + TimeDelta::milliseconds(1));
}

#[tokio::test]
async fn create_watch_validation_failures_return_400() {
    let app = setup_test_app().await;

    let cases = [
        serde_json::json!({
            "name": "", "url": "https://example.com",
            "xpath": "//a/text()", "period_seconds": 60,
        }),
        serde_json::json!({
            "name": "n", "url": "not a url",
            "xpath": "//a/text()", "period_seconds": 60,
        }),
        serde_json::json!({
            "name": "n", "url": "https://example.com",
            "xpath": "//a[", "period_seconds": 60,
        }),
        serde_json::json!({
            "name": "n", "url": "https://example.com",
            "xpath": "//a/text()", "period_seconds": 0,
        }),
        serde_json::json!({
            "name": "n", "url": "https://example.com",
            "xpath": "//a/text()", "period_seconds": -60,
        }),
    ];

    for case in cases {
        let (status, json) = send(
            &app.router,
            authed(ALICE_TOKEN, Request::post("/v1/watches"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&case).unwrap()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case: {case}");
        assert_eq!(json["error"], "validation_error");
    }
}

#[tokio::test]
async fn get_watch_roundtrip_and_404() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();

    let (status, json) = send(
        &app.router,
        authed(ALICE_TOKEN, Request::get(format!("/v1/watches/{id}")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], created["id"]);
    assert_eq!(json["url"], "https://example.com/releases");

    let (status, json) = send(
        &app.router,
        authed(
            ALICE_TOKEN,
            Request::get(format!("/v1/watches/{}", uuid::Uuid::new_v4())),
        )
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn other_users_watch_is_unauthorized() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &app.router,
        authed(BOB_TOKEN, Request::get(format!("/v1/watches/{id}")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        authed(BOB_TOKEN, Request::delete(format!("/v1/watches/{id}")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Bob's own listing does not include Alice's watch.
    let (status, json) = send(
        &app.router,
        authed(BOB_TOKEN, Request::get("/v1/watches"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn update_watch_preserves_next_check() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();

    let update = serde_json::json!({
        "name": "renamed",
        "period_seconds": 7200,
        "notify": true,
    });
    let (status, json) = send(
        &app.router,
        authed(ALICE_TOKEN, Request::put(format!("/v1/watches/{id}")))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&update).unwrap()))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "renamed");
    assert_eq!(json["period_seconds"], 7200);
    assert_eq!(json["notify"], true);
    // Editing never reschedules.
    assert_eq!(json["next_check"], created["next_check"]);
}

#[tokio::test]
async fn update_watch_rejects_bad_fields() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();

    for update in [
        serde_json::json!({"period_seconds": 0}),
        serde_json::json!({"xpath": "//a["}),
        serde_json::json!({"name": "  "}),
    ] {
        let (status, _) = send(
            &app.router,
            authed(ALICE_TOKEN, Request::put(format!("/v1/watches/{id}")))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&update).unwrap()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "update: {update}");
    }
}

#[tokio::test]
async fn delete_watch_removes_it_and_its_values() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();
    let watch_id: uuid::Uuid = id.parse().unwrap();

    seed_value(&app.pool, watch_id, Utc::now(), "1.0").await;
    seed_value(&app.pool, watch_id, Utc::now() + TimeDelta::seconds(60), "1.1").await;

    let (status, _) = send(
        &app.router,
        authed(ALICE_TOKEN, Request::delete(format!("/v1/watches/{id}")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app.router,
        authed(ALICE_TOKEN, Request::get(format!("/v1/watches/{id}")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (count,): (i64,) =
        sqlx::query_as(r#"SELECT COUNT(*) FROM watch_values WHERE watch_id = $1"#)
            .bind(watch_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn latest_value_returns_404_when_nothing_recorded() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();

    let (status, json) = send(
        &app.router,
        authed(ALICE_TOKEN, Request::get(format!("/v1/watches/{id}/value")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn latest_value_returns_the_most_recent_entry() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();
    let watch_id: uuid::Uuid = id.parse().unwrap();

    let base = Utc::now();
    seed_value(&app.pool, watch_id, base, "1.0").await;
    seed_value(&app.pool, watch_id, base + TimeDelta::seconds(60), "1.1").await;
    seed_value(&app.pool, watch_id, base + TimeDelta::seconds(120), "2.0").await;

    let (status, json) = send(
        &app.router,
        authed(ALICE_TOKEN, Request::get(format!("/v1/watches/{id}/value")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["content"], "2.0");
    assert_eq!(json["watch_id"], created["id"]);
}

#[tokio::test]
async fn value_history_is_owner_only_and_oldest_first() {
    let app = setup_test_app().await;
    let created = create_watch(&app.router, ALICE_TOKEN).await;
    let id = created["id"].as_str().unwrap();
    let watch_id: uuid::Uuid = id.parse().unwrap();

    let base = Utc::now();
    seed_value(&app.pool, watch_id, base + TimeDelta::seconds(60), "1.1").await;
    seed_value(&app.pool, watch_id, base, "1.0").await;

    let (status, json) = send(
        &app.router,
        authed(
            ALICE_TOKEN,
            Request::get(format!("/v1/watches/{id}/value/all")),
        )
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    assert_eq!(json["values"][0]["content"], "1.0");
    assert_eq!(json["values"][1]["content"], "1.1");

    let (status, _) = send(
        &app.router,
        authed(
            BOB_TOKEN,
            Request::get(format!("/v1/watches/{id}/value/all")),
        )
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
