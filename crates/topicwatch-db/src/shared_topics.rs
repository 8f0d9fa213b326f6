//! Database operations for `shared_topics`, the registry keyed by normalized name.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use topicwatch_core::{merge_csv_tokens, normalize_topic_name, CollectionStatus, TopicRef};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `shared_topics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SharedTopicRow {
    pub id: i64,
    pub name: String,
    pub keywords: String,
    pub profiles: String,
    pub created_at: DateTime<Utc>,
    pub last_collected: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub collection_status: CollectionStatus,
    pub collection_start_time: Option<DateTime<Utc>>,
    pub collection_end_time: Option<DateTime<Utc>>,
    pub collection_errors: Option<String>,
    /// Cached count, refreshed after each collection. Read paths that need
    /// an exact figure count `shared_posts` directly.
    pub posts_count: i32,
}

impl SharedTopicRow {
    #[must_use]
    pub fn topic_ref(&self) -> TopicRef {
        TopicRef {
            id: self.id,
            name: self.name.clone(),
            keywords: self.keywords.clone(),
            profiles: self.profiles.clone(),
        }
    }
}

/// A search hit with live post and subscriber counts.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicSearchRow {
    pub id: i64,
    pub name: String,
    pub keywords: String,
    pub profiles: String,
    pub posts_count: i64,
    pub subscribers_count: i64,
    pub last_collected: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct SharedTopicStats {
    pub posts_count: i64,
    pub subscribers_count: i64,
}

// ---------------------------------------------------------------------------
// Registry operations
// ---------------------------------------------------------------------------

/// Looks up a shared topic by the normalized form of `name`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_exact_shared_topic(
    pool: &PgPool,
    name: &str,
) -> Result<Option<SharedTopicRow>, DbError> {
    let normalized = normalize_topic_name(name);
    if normalized.is_empty() {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, SharedTopicRow>(
        "SELECT id, name, keywords, profiles, created_at, last_collected, collection_status, \
                collection_start_time, collection_end_time, collection_errors, posts_count \
         FROM shared_topics \
         WHERE name = $1",
    )
    .bind(&normalized)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the shared topic for `name`, creating it when absent.
///
/// When the topic already exists, `keywords` and `profiles` are merged into
/// the stored lists as a case-insensitive token union. Runs in a single
/// transaction; concurrent callers with the same normalized name converge
/// on one row via the unique constraint on `name`.
///
/// # Errors
///
/// Returns [`DbError::InvalidTopicName`] if `name` normalizes to an empty
/// string, or [`DbError::Sqlx`] if any statement fails.
pub async fn find_or_create_shared_topic(
    pool: &PgPool,
    name: &str,
    keywords: &str,
    profiles: &str,
) -> Result<SharedTopicRow, DbError> {
    let mut tx = pool.begin().await?;
    let row = find_or_create_with(&mut *tx, name, keywords, profiles).await?;
    tx.commit().await?;
    Ok(row)
}

/// Connection-level body of [`find_or_create_shared_topic`], reused by the
/// legacy migration inside its per-topic transaction.
pub(crate) async fn find_or_create_with(
    conn: &mut PgConnection,
    name: &str,
    keywords: &str,
    profiles: &str,
) -> Result<SharedTopicRow, DbError> {
    const MAX_ATTEMPTS: usize = 3;

    let normalized = normalize_topic_name(name);
    if normalized.is_empty() {
        return Err(DbError::InvalidTopicName(name.to_string()));
    }
    let keywords = merge_csv_tokens("", keywords);
    let profiles = merge_csv_tokens("", profiles);

    for _ in 0..MAX_ATTEMPTS {
        let inserted = sqlx::query_as::<_, SharedTopicRow>(
            "INSERT INTO shared_topics (name, keywords, profiles) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING id, name, keywords, profiles, created_at, last_collected, \
                       collection_status, collection_start_time, collection_end_time, \
                       collection_errors, posts_count",
        )
        .bind(&normalized)
        .bind(&keywords)
        .bind(&profiles)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = inserted {
            return Ok(row);
        }

        let existing = sqlx::query_as::<_, SharedTopicRow>(
            "SELECT id, name, keywords, profiles, created_at, last_collected, collection_status, \
                    collection_start_time, collection_end_time, collection_errors, posts_count \
             FROM shared_topics \
             WHERE name = $1 \
             FOR UPDATE",
        )
        .bind(&normalized)
        .fetch_optional(&mut *conn)
        .await?;

        // The conflicting row can vanish between the insert and the lock
        // (orphan sweep); go around and insert again.
        let Some(existing) = existing else {
            continue;
        };

        let merged_keywords = merge_csv_tokens(&existing.keywords, &keywords);
        let merged_profiles = merge_csv_tokens(&existing.profiles, &profiles);
        if merged_keywords == existing.keywords && merged_profiles == existing.profiles {
            return Ok(existing);
        }

        let updated = sqlx::query_as::<_, SharedTopicRow>(
            "UPDATE shared_topics \
             SET keywords = $1, profiles = $2 \
             WHERE id = $3 \
             RETURNING id, name, keywords, profiles, created_at, last_collected, \
                       collection_status, collection_start_time, collection_end_time, \
                       collection_errors, posts_count",
        )
        .bind(&merged_keywords)
        .bind(&merged_profiles)
        .bind(existing.id)
        .fetch_one(&mut *conn)
        .await?;

        return Ok(updated);
    }

    Err(DbError::NotFound)
}

/// Fetches a shared topic by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_shared_topic(pool: &PgPool, id: i64) -> Result<SharedTopicRow, DbError> {
    sqlx::query_as::<_, SharedTopicRow>(
        "SELECT id, name, keywords, profiles, created_at, last_collected, collection_status, \
                collection_start_time, collection_end_time, collection_errors, posts_count \
         FROM shared_topics \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns every shared topic, oldest first. This is the collection work list.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_shared_topics(pool: &PgPool) -> Result<Vec<SharedTopicRow>, DbError> {
    let rows = sqlx::query_as::<_, SharedTopicRow>(
        "SELECT id, name, keywords, profiles, created_at, last_collected, collection_status, \
                collection_start_time, collection_end_time, collection_errors, posts_count \
         FROM shared_topics \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Finds topics whose name contains the normalized query or whose keywords
/// contain the raw query (case-insensitive).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn search_shared_topics(
    pool: &PgPool,
    query: &str,
    limit: i64,
) -> Result<Vec<TopicSearchRow>, DbError> {
    let normalized = normalize_topic_name(query);

    let rows = sqlx::query_as::<_, TopicSearchRow>(
        "SELECT t.id, t.name, t.keywords, t.profiles, \
                (SELECT COUNT(*) FROM shared_posts p WHERE p.shared_topic_id = t.id) AS posts_count, \
                (SELECT COUNT(*) FROM user_topic_subscriptions s WHERE s.shared_topic_id = t.id) \
                    AS subscribers_count, \
                t.last_collected, t.created_at \
         FROM shared_topics t \
         WHERE strpos(t.name, $1) > 0 \
            OR strpos(lower(t.keywords), lower($2)) > 0 \
         ORDER BY t.name \
         LIMIT $3",
    )
    .bind(&normalized)
    .bind(query.trim())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Live post and subscriber counts for one topic.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shared_topic_stats(
    pool: &PgPool,
    shared_topic_id: i64,
) -> Result<SharedTopicStats, DbError> {
    let stats = sqlx::query_as::<_, SharedTopicStats>(
        "SELECT \
            (SELECT COUNT(*) FROM shared_posts WHERE shared_topic_id = $1) AS posts_count, \
            (SELECT COUNT(*) FROM user_topic_subscriptions WHERE shared_topic_id = $1) \
                AS subscribers_count",
    )
    .bind(shared_topic_id)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

/// Deletes a shared topic; its posts and subscriptions cascade.
///
/// Returns `true` if a row was deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_shared_topic(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM shared_topics WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
