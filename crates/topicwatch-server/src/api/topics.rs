use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{normalize_limit, ApiError, ApiResponse, AppState, Missing, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PostsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct TopicItem {
    id: i64,
    name: String,
    keywords: String,
    profiles: String,
    posts_count: i64,
    subscribers_count: i64,
    last_collected: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct PostItem {
    id: i64,
    source: String,
    title: Option<String>,
    content: String,
    url: String,
    posted_at: DateTime<Utc>,
    likes: i32,
    comments: i32,
    image_url: Option<String>,
    is_photo: bool,
    subreddit: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct PaginatedPosts {
    topic_id: i64,
    topic_name: String,
    total: i64,
    limit: i64,
    offset: i64,
    items: Vec<PostItem>,
}

/// GET /api/v1/topics/search?q=
pub(super) async fn search_topics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<TopicItem>>>, ApiError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(ApiError::validation(
            req_id.0,
            "query parameter 'q' must not be empty",
        ));
    }

    let rows = topicwatch_db::search_shared_topics(&state.pool, q, normalize_limit(query.limit))
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::Topic, &e))?;

    let data = rows
        .into_iter()
        .map(|row| TopicItem {
            id: row.id,
            name: row.name,
            keywords: row.keywords,
            profiles: row.profiles,
            posts_count: row.posts_count,
            subscribers_count: row.subscribers_count,
            last_collected: row.last_collected,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/topics/{topic_id}/posts?limit=&offset=
pub(super) async fn list_topic_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(topic_id): Path<i64>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<ApiResponse<PaginatedPosts>>, ApiError> {
    let topic = topicwatch_db::get_shared_topic(&state.pool, topic_id)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::Topic, &e))?;

    let limit = normalize_limit(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let total = topicwatch_db::count_shared_topic_posts(&state.pool, topic_id)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::Topic, &e))?;
    let rows = topicwatch_db::list_shared_topic_posts(&state.pool, topic_id, limit, offset)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.as_str(), Missing::Topic, &e))?;

    let items = rows
        .into_iter()
        .map(|row| PostItem {
            id: row.id,
            source: row.source,
            title: row.title,
            content: row.content,
            url: row.url,
            posted_at: row.posted_at,
            likes: row.likes,
            comments: row.comments,
            image_url: row.image_url,
            is_photo: row.is_photo,
            subreddit: row.subreddit,
        })
        .collect();

    Ok(Json(ApiResponse {
        data: PaginatedPosts {
            topic_id,
            topic_name: topic.name,
            total,
            limit,
            offset,
            items,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
