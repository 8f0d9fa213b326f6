//! Per-topic collection state machine on `shared_topics.collection_status`.
//!
//! `idle | completed | failed -> collecting -> completed | failed`. A topic
//! stuck in `collecting` past the caller's stale cutoff may be reclaimed.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use topicwatch_core::CollectionStatus;

use crate::DbError;

/// Moves a topic into `collecting` and stamps `collection_start_time`.
///
/// Returns `false` without changing anything when the topic is already
/// collecting and its run started after `stale_before`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the topic does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn begin_collection(
    pool: &PgPool,
    id: i64,
    stale_before: DateTime<Utc>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE shared_topics \
         SET collection_status = 'collecting', \
             collection_start_time = NOW(), \
             collection_end_time = NULL \
         WHERE id = $1 \
           AND (collection_status <> 'collecting' \
                OR collection_start_time IS NULL \
                OR collection_start_time < $2)",
    )
    .bind(id)
    .bind(stale_before)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(true);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM shared_topics WHERE id = $1)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    if exists {
        Ok(false)
    } else {
        Err(DbError::NotFound)
    }
}

/// Marks a collecting topic `completed`, clears its errors, and records
/// `last_collected` plus a fresh `posts_count`.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the topic is not
/// collecting, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_collection(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE shared_topics \
         SET collection_status = 'completed', \
             collection_end_time = NOW(), \
             collection_errors = NULL, \
             last_collected = NOW(), \
             posts_count = (SELECT COUNT(*) FROM shared_posts WHERE shared_topic_id = $1) \
         WHERE id = $1 AND collection_status = 'collecting'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            id,
            expected_status: CollectionStatus::Collecting,
        });
    }

    Ok(())
}

/// Marks a collecting topic `failed` with the joined error text. The topic
/// still counts as collected for cooldown purposes.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the topic is not
/// collecting, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_collection(pool: &PgPool, id: i64, errors: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE shared_topics \
         SET collection_status = 'failed', \
             collection_end_time = NOW(), \
             collection_errors = $2, \
             last_collected = NOW(), \
             posts_count = (SELECT COUNT(*) FROM shared_posts WHERE shared_topic_id = $1) \
         WHERE id = $1 AND collection_status = 'collecting'",
    )
    .bind(id)
    .bind(errors)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            id,
            expected_status: CollectionStatus::Collecting,
        });
    }

    Ok(())
}
