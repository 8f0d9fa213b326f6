//! Per-user subscription handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use topicwatch_collect::Subscribed;
use topicwatch_core::CollectionStatus;
use topicwatch_db::{SubscriptionStyle, SubscriptionView};

use crate::middleware::RequestId;

use super::{require_user, ApiError, ApiResponse, AppState, Missing, ResponseMeta};

const MAX_TOPIC_NAME_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub(super) struct SubscribeRequest {
    pub name: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub profiles: String,
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateStyleRequest {
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SubscriptionItem {
    topic_id: i64,
    subscription_id: i64,
    name: String,
    original_name: String,
    color: String,
    icon: String,
    keywords: String,
    profiles: String,
    posts_count: i64,
    collection_status: CollectionStatus,
    last_collected: Option<DateTime<Utc>>,
    last_viewed: Option<DateTime<Utc>>,
    subscribed_at: DateTime<Utc>,
}

impl From<SubscriptionView> for SubscriptionItem {
    fn from(view: SubscriptionView) -> Self {
        Self {
            topic_id: view.shared_topic_id,
            subscription_id: view.subscription_id,
            name: view.name,
            original_name: view.original_name,
            color: view.color,
            icon: view.icon,
            keywords: view.keywords,
            profiles: view.profiles,
            posts_count: view.posts_count,
            collection_status: view.collection_status,
            last_collected: view.last_collected,
            last_viewed: view.last_viewed,
            subscribed_at: view.subscribed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct StyleItem {
    topic_id: i64,
    display_name: Option<String>,
    color: String,
    icon: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ChangedItem {
    topic_id: i64,
    changed: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// GET /api/v1/users/{user_id}/subscriptions
pub(super) async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<SubscriptionItem>>>, ApiError> {
    require_user(&state.pool, &req_id.0, user_id).await?;

    let rows = topicwatch_db::list_user_subscriptions(&state.pool, user_id)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::User, &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(SubscriptionItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/users/{user_id}/subscriptions
pub(super) async fn subscribe(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
    Json(body): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Subscribed>>), ApiError> {
    let rid = &req_id.0;

    if body.name.chars().count() > MAX_TOPIC_NAME_CHARS {
        return Err(ApiError::validation(
            rid.as_str(),
            format!("name must be at most {MAX_TOPIC_NAME_CHARS} characters"),
        ));
    }
    require_user(&state.pool, rid, user_id).await?;

    let style = SubscriptionStyle {
        display_name: non_blank(body.display_name),
        color: non_blank(body.color),
        icon: non_blank(body.icon),
    };

    let subscribed = topicwatch_collect::subscribe(
        &state.pool,
        user_id,
        &body.name,
        &body.keywords,
        &body.profiles,
        &style,
    )
    .await
    .map_err(|e| ApiError::from_db(rid.as_str(), Missing::User, &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: subscribed,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// PATCH /api/v1/users/{user_id}/subscriptions/{topic_id}
pub(super) async fn update_style(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((user_id, topic_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateStyleRequest>,
) -> Result<Json<ApiResponse<StyleItem>>, ApiError> {
    let style = SubscriptionStyle {
        display_name: non_blank(body.display_name),
        color: non_blank(body.color),
        icon: non_blank(body.icon),
    };

    let row = topicwatch_db::update_subscription_style(&state.pool, user_id, topic_id, &style)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::Subscription, &e))?;

    Ok(Json(ApiResponse {
        data: StyleItem {
            topic_id: row.shared_topic_id,
            display_name: row.display_name,
            color: row.color,
            icon: row.icon,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/users/{user_id}/subscriptions/{topic_id}
///
/// The shared topic and its posts stay; the orphan sweep decides their fate.
pub(super) async fn unsubscribe(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((user_id, topic_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<ChangedItem>>, ApiError> {
    let removed = topicwatch_db::unsubscribe_user_from_topic(&state.pool, user_id, topic_id)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::Subscription, &e))?;

    if !removed {
        return Err(ApiError::not_found(req_id.0, Missing::Subscription));
    }

    Ok(Json(ApiResponse {
        data: ChangedItem {
            topic_id,
            changed: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/users/{user_id}/subscriptions/{topic_id}/viewed
pub(super) async fn mark_viewed(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((user_id, topic_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<ChangedItem>>, ApiError> {
    let updated = topicwatch_db::mark_subscription_viewed(&state.pool, user_id, topic_id)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::Subscription, &e))?;

    if !updated {
        return Err(ApiError::not_found(req_id.0, Missing::Subscription));
    }

    Ok(Json(ApiResponse {
        data: ChangedItem {
            topic_id,
            changed: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
