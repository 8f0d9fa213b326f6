use axum::body::{to_bytes, Body};
use axum::http::Request;
use tower::ServiceExt;

use super::*;
use crate::test_support::offline_collector;

fn app(pool: PgPool) -> Router {
    let auth = AuthState::from_keys("", true).expect("auth");
    build_app(
        AppState {
            collector: offline_collector(pool.clone()),
            pool,
        },
        auth,
        default_rate_limit_state(),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn guest_id(pool: &PgPool) -> i64 {
    topicwatch_db::create_guest_user(pool)
        .await
        .expect("guest user")
        .id
}

#[test]
fn normalize_limit_applies_defaults_and_bounds() {
    assert_eq!(normalize_limit(None), 50);
    assert_eq!(normalize_limit(Some(0)), 1);
    assert_eq!(normalize_limit(Some(1_000)), 200);
    assert_eq!(normalize_limit(Some(25)), 25);
}

#[test]
fn error_codes_map_to_statuses() {
    let cases = [
        (ErrorCode::NotFound, StatusCode::NOT_FOUND),
        (ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED),
        (ErrorCode::ValidationError, StatusCode::BAD_REQUEST),
        (ErrorCode::RateLimited, StatusCode::TOO_MANY_REQUESTS),
        (ErrorCode::InternalError, StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), status, "{code:?}");
    }
}

#[test]
fn store_errors_name_the_missing_row() {
    let missing = ApiError::from_db(
        "req-1",
        Missing::Subscription,
        &topicwatch_db::DbError::NotFound,
    );
    assert_eq!(missing.error.code, ErrorCode::NotFound);
    assert_eq!(missing.error.message, "subscription not found");

    let invalid = ApiError::from_db(
        "req-1",
        Missing::Topic,
        &topicwatch_db::DbError::InvalidTopicName("!!!".to_string()),
    );
    assert_eq!(invalid.error.code, ErrorCode::ValidationError);
    assert!(invalid.error.message.contains("!!!"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_database_ok_and_echoes_request_id(pool: PgPool) {
    let app = app(pool);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header("x-request-id", "req-health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-health")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_require_bearer_token(pool: PgPool) {
    let auth = AuthState::from_keys("secret", false).expect("auth");
    let app = build_app(
        AppState {
            collector: offline_collector(pool.clone()),
            pool,
        },
        auth,
        default_rate_limit_state(),
    );

    let (status, body) = send(&app, get("/api/v1/topics/search?q=rust")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let authed = Request::builder()
        .uri("/api/v1/topics/search?q=rust")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&app, authed).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK, "health stays public");
}

#[sqlx::test(migrations = "../../migrations")]
async fn two_users_share_one_topic_with_their_own_names(pool: PgPool) {
    let alice = guest_id(&pool).await;
    let bob = guest_id(&pool).await;
    let app = app(pool);

    let (status, first) = send(
        &app,
        post_json(
            &format!("/api/v1/users/{alice}/subscriptions"),
            &serde_json::json!({ "name": "Elon Musk", "keywords": "spacex", "display_name": "Elon" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["data"]["topic_name"], "elon musk");
    assert_eq!(first["data"]["needs_collection"], true);

    let (status, second) = send(
        &app,
        post_json(
            &format!("/api/v1/users/{bob}/subscriptions"),
            &serde_json::json!({ "name": "  ELON musk ", "keywords": "tesla" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["data"]["topic_id"], first["data"]["topic_id"]);
    assert_eq!(second["data"]["keywords"], "spacex, tesla");

    let (status, list) = send(&app, get(&format!("/api/v1/users/{alice}/subscriptions"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"][0]["name"], "Elon");
    assert_eq!(list["data"][0]["original_name"], "elon musk");

    let (_, list) = send(&app, get(&format!("/api/v1/users/{bob}/subscriptions"))).await;
    assert_eq!(list["data"][0]["name"], "elon musk");

    let (status, hits) = send(&app, get("/api/v1/topics/search?q=Elon")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits["data"][0]["subscribers_count"], 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn subscribe_validates_name_and_user(pool: PgPool) {
    let user = guest_id(&pool).await;
    let app = app(pool);

    let (status, body) = send(
        &app,
        post_json(
            &format!("/api/v1/users/{user}/subscriptions"),
            &serde_json::json!({ "name": "  !!! " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/users/999999/subscriptions",
            &serde_json::json!({ "name": "rust" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "user not found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn style_view_and_unsubscribe_round(pool: PgPool) {
    let user = guest_id(&pool).await;
    let app = app(pool);

    let (_, created) = send(
        &app,
        post_json(
            &format!("/api/v1/users/{user}/subscriptions"),
            &serde_json::json!({ "name": "rust" }),
        ),
    )
    .await;
    let topic_id = created["data"]["topic_id"].as_i64().expect("topic id");
    let base = format!("/api/v1/users/{user}/subscriptions/{topic_id}");

    let patch = Request::builder()
        .method("PATCH")
        .uri(&base)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r##"{"color":"#ff0000"}"##))
        .expect("request");
    let (status, styled) = send(&app, patch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(styled["data"]["color"], "#ff0000");

    let (status, _) = send(&app, empty("POST", &format!("{base}/viewed"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, empty("DELETE", &base)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, empty("DELETE", &base)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, empty("POST", &format!("{base}/viewed"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_requires_query(pool: PgPool) {
    let app = app(pool);
    let (status, _) = send(&app, get("/api/v1/topics/search?q=%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn topic_posts_page_newest_first(pool: PgPool) {
    let topic = topicwatch_db::find_or_create_shared_topic(&pool, "rust", "", "")
        .await
        .expect("topic");
    for n in 0..3 {
        let post = topicwatch_core::FetchedPost::new(
            topicwatch_core::Source::News,
            format!("post {n}"),
            format!("https://example.com/{n}"),
            Utc::now() - chrono::TimeDelta::hours(n),
        );
        topicwatch_db::create_shared_post(&pool, topic.id, &post)
            .await
            .expect("post");
    }
    let app = app(pool);

    let (status, page) = send(
        &app,
        get(&format!("/api/v1/topics/{}/posts?limit=2", topic.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 3);
    assert_eq!(page["data"]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(page["data"]["items"][0]["url"], "https://example.com/0");

    let (status, _) = send(&app, get("/api/v1/topics/999999/posts")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn collect_topic_reports_failure_then_cooldown(pool: PgPool) {
    let topic = topicwatch_db::find_or_create_shared_topic(&pool, "rust", "", "")
        .await
        .expect("topic");
    let app = app(pool);
    let uri = format!("/api/v1/topics/{}/collect", topic.id);

    let (status, first) = send(&app, empty("POST", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["success"], false);
    assert_eq!(first["data"]["skipped"], false);

    let (_, second) = send(&app, empty("POST", &uri)).await;
    assert_eq!(second["data"]["skipped"], true);

    let (_, forced) = send(&app, empty("POST", &format!("{uri}?force=true"))).await;
    assert_eq!(forced["data"]["skipped"], false);

    let (status, _) = send(&app, empty("POST", "/api/v1/topics/999999/collect")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn collect_all_returns_summary(pool: PgPool) {
    topicwatch_db::find_or_create_shared_topic(&pool, "rust", "", "")
        .await
        .expect("topic");
    let app = app(pool);

    let (status, body) = send(&app, empty("POST", "/api/v1/collect")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_topics"], 1);
    assert_eq!(body["data"]["total_posts"], 0);
    assert!(body["data"]["errors"].as_array().is_some_and(|e| !e.is_empty()));
}

#[sqlx::test(migrations = "../../migrations")]
async fn rate_limit_is_counted_per_user(pool: PgPool) {
    let alice = guest_id(&pool).await;
    let bob = guest_id(&pool).await;
    let app = build_app(
        AppState {
            collector: offline_collector(pool.clone()),
            pool,
        },
        AuthState::from_keys("", true).expect("auth"),
        RateLimitState::new(1, Duration::from_secs(60)),
    );

    let alice_uri = format!("/api/v1/users/{alice}/subscriptions");
    let (status, _) = send(&app, get(&alice_uri)).await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&alice_uri)
                .header("x-request-id", "req-limited")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("retry-after seconds");
    assert!((1..=60).contains(&retry_after), "got {retry_after}");
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let body: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
    assert_eq!(body["error"]["code"], "rate_limited");
    assert_eq!(body["meta"]["request_id"], "req-limited");

    let (status, _) = send(&app, get(&format!("/api/v1/users/{bob}/subscriptions"))).await;
    assert_eq!(status, StatusCode::OK, "another user has a separate budget");
}
