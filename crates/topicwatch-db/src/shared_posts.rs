//! Database operations for `shared_posts`. Post URLs are globally unique.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use topicwatch_core::{canonicalize_post_url, FetchedPost};

use crate::DbError;

/// A row from the `shared_posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SharedPostRow {
    pub id: i64,
    pub shared_topic_id: i64,
    pub source: String,
    pub title: Option<String>,
    pub content: String,
    pub url: String,
    pub posted_at: DateTime<Utc>,
    pub likes: i32,
    pub comments: i32,
    pub image_url: Option<String>,
    pub is_photo: bool,
    pub subreddit: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A post as shown in a user's digest, labelled with the user's topic name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DigestPostRow {
    pub topic_name: String,
    pub source: String,
    pub title: Option<String>,
    pub content: String,
    pub url: String,
    pub posted_at: DateTime<Utc>,
}

/// Stores a post under `shared_topic_id` unless its URL is already stored.
///
/// The URL is canonicalized first (fragment and `utm_*` parameters dropped),
/// so two links to the same article collapse onto one row. Returns `true`
/// when a row was inserted and `false` when any post, under any topic or
/// source, already holds the canonical URL. Repeating a call is harmless.
///
/// # Errors
///
/// Returns [`DbError::InvalidPostUrl`] for a blank or non-http(s) URL, or
/// [`DbError::Sqlx`] if the insert fails for any other reason.
pub async fn create_shared_post(
    pool: &PgPool,
    shared_topic_id: i64,
    post: &FetchedPost,
) -> Result<bool, DbError> {
    insert_shared_post(pool, shared_topic_id, post).await
}

/// Executor-generic body of [`create_shared_post`], reused by the legacy
/// migration inside its per-topic transaction.
pub(crate) async fn insert_shared_post<'e, E>(
    executor: E,
    shared_topic_id: i64,
    post: &FetchedPost,
) -> Result<bool, DbError>
where
    E: PgExecutor<'e>,
{
    let url = canonicalize_post_url(&post.url).ok_or(DbError::InvalidPostUrl)?;

    let result = sqlx::query(
        "INSERT INTO shared_posts \
             (shared_topic_id, source, title, content, url, posted_at, \
              likes, comments, image_url, is_photo, subreddit) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (url) DO NOTHING",
    )
    .bind(shared_topic_id)
    .bind(post.source.as_str())
    .bind(post.title.as_deref())
    .bind(&post.content)
    .bind(&url)
    .bind(post.posted_at)
    .bind(post.likes)
    .bind(post.comments)
    .bind(post.image_url.as_deref())
    .bind(post.is_photo)
    .bind(post.subreddit.as_deref())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Returns a page of a topic's posts, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_shared_topic_posts(
    pool: &PgPool,
    shared_topic_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<SharedPostRow>, DbError> {
    let rows = sqlx::query_as::<_, SharedPostRow>(
        "SELECT id, shared_topic_id, source, title, content, url, posted_at, \
                likes, comments, image_url, is_photo, subreddit, created_at \
         FROM shared_posts \
         WHERE shared_topic_id = $1 \
         ORDER BY posted_at DESC, id DESC \
         LIMIT $2 OFFSET $3",
    )
    .bind(shared_topic_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_shared_topic_posts(pool: &PgPool, shared_topic_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM shared_posts WHERE shared_topic_id = $1",
    )
    .bind(shared_topic_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Posts from every topic the user follows, posted at or after `since`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_posts_for_user(
    pool: &PgPool,
    user_id: i64,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<DigestPostRow>, DbError> {
    let rows = sqlx::query_as::<_, DigestPostRow>(
        "SELECT COALESCE(s.display_name, t.name) AS topic_name, \
                p.source, p.title, p.content, p.url, p.posted_at \
         FROM shared_posts p \
         JOIN shared_topics t ON t.id = p.shared_topic_id \
         JOIN user_topic_subscriptions s ON s.shared_topic_id = t.id \
         WHERE s.user_id = $1 AND p.posted_at >= $2 \
         ORDER BY p.posted_at DESC, p.id DESC \
         LIMIT $3",
    )
    .bind(user_id)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
