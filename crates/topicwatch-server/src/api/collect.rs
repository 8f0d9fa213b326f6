//! On-demand collection triggers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use topicwatch_collect::{CollectError, CollectionSummary, TopicCollectionOutcome};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, Missing, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CollectQuery {
    #[serde(default)]
    pub force: bool,
}

/// POST /api/v1/topics/{topic_id}/collect?force=
///
/// A topic inside its cooldown comes back `skipped` with a reason rather
/// than as an error.
pub(super) async fn collect_topic(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(topic_id): Path<i64>,
    Query(query): Query<CollectQuery>,
) -> Result<Json<ApiResponse<TopicCollectionOutcome>>, ApiError> {
    let outcome = state
        .collector
        .collect_one_topic(topic_id, query.force)
        .await
        .map_err(|e| match e {
            CollectError::TopicNotFound(_) => ApiError::not_found(req_id.0.as_str(), Missing::Topic),
            CollectError::Db(db) => ApiError::from_db(req_id.0.as_str(), Missing::Topic, &db),
        })?;

    Ok(Json(ApiResponse {
        data: outcome,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/collect?force=
pub(super) async fn collect_all(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CollectQuery>,
) -> Json<ApiResponse<CollectionSummary>> {
    let summary = state
        .collector
        .collect_all_shared_topics(query.force, &|line: &str| {
            tracing::info!(target: "topicwatch::collect", "{line}");
        })
        .await;

    Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    })
}
