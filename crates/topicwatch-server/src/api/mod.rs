mod collect;
mod error;
mod subscriptions;
mod topics;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use topicwatch_collect::SharedTopicCollector;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

pub use error::{ApiError, ErrorCode, Missing};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const RATE_LIMIT_REQUESTS: usize = 120;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub collector: Arc<SharedTopicCollector>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

/// Page size for list endpoints: 50 when absent, clamped to 1..=200.
pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Resolves the `{user_id}` path segment to an existing user.
pub(super) async fn require_user(
    pool: &PgPool,
    request_id: &str,
    user_id: i64,
) -> Result<topicwatch_db::UserRow, ApiError> {
    topicwatch_db::get_user(pool, user_id)
        .await
        .map_err(|e| ApiError::from_db(request_id, Missing::User, &e))
}

/// Per-user subscription management.
fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/users/{user_id}/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::subscribe),
        )
        .route(
            "/api/v1/users/{user_id}/subscriptions/{topic_id}",
            patch(subscriptions::update_style).delete(subscriptions::unsubscribe),
        )
        .route(
            "/api/v1/users/{user_id}/subscriptions/{topic_id}/viewed",
            post(subscriptions::mark_viewed),
        )
}

/// Shared topic reads and collection triggers.
fn topic_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/topics/search", get(topics::search_topics))
        .route("/api/v1/topics/{topic_id}/posts", get(topics::list_topic_posts))
        .route("/api/v1/topics/{topic_id}/collect", post(collect::collect_topic))
        .route("/api/v1/collect", post(collect::collect_all))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

/// Health is public. Everything else sits behind auth, then the per-caller
/// rate limit, so unauthenticated traffic never spends a caller's budget.
pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let protected = subscription_routes().merge(topic_routes()).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(auth, require_bearer_auth))
            .layer(axum::middleware::from_fn_with_state(
                rate_limit,
                enforce_rate_limit,
            )),
    );

    Router::new()
        .route("/api/v1/health", get(health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let (status, data) = match topicwatch_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            HealthData {
                status: "ok",
                database: "ok",
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthData {
                    status: "degraded",
                    database: "unavailable",
                },
            )
        }
    };

    (
        status,
        Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}

#[must_use]
pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW)
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
