//! Database operations for `user_topic_subscriptions`.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use topicwatch_core::CollectionStatus;

use crate::shared_topics::{find_or_create_with, SharedTopicRow};
use crate::DbError;

pub const DEFAULT_COLOR: &str = "#1f77b4";
pub const DEFAULT_ICON: &str = "📌";

/// A row from the `user_topic_subscriptions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub user_id: i64,
    pub shared_topic_id: i64,
    pub display_name: Option<String>,
    pub color: String,
    pub icon: String,
    pub last_viewed: Option<DateTime<Utc>>,
    pub subscribed_at: DateTime<Utc>,
}

/// Per-user presentation of a subscribed topic. `None` fields fall back to
/// the topic name and the default color/icon.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionStyle {
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// One entry of a user's subscription list, joined with its topic.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionView {
    pub subscription_id: i64,
    pub shared_topic_id: i64,
    /// Display name when set, else the normalized topic name.
    pub name: String,
    pub original_name: String,
    pub color: String,
    pub icon: String,
    pub keywords: String,
    pub profiles: String,
    pub last_viewed: Option<DateTime<Utc>>,
    pub subscribed_at: DateTime<Utc>,
    pub last_collected: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub collection_status: CollectionStatus,
    /// Counted at read time, not taken from the cached topic column.
    pub posts_count: i64,
}

/// Subscribes a user to a shared topic.
///
/// Idempotent: when the pair already exists the stored subscription is
/// returned unchanged and `style` is ignored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including foreign-key
/// violations for unknown users or topics.
pub async fn subscribe_user_to_topic(
    pool: &PgPool,
    user_id: i64,
    shared_topic_id: i64,
    style: &SubscriptionStyle,
) -> Result<SubscriptionRow, DbError> {
    let mut conn = pool.acquire().await?;
    subscribe_with(&mut *conn, user_id, shared_topic_id, style).await
}

/// Finds or creates the shared topic for `name` and subscribes `user_id`
/// to it in a single transaction. If the subscription cannot be written
/// (for example the user does not exist), a topic created here is rolled
/// back with it.
///
/// # Errors
///
/// Returns [`DbError::InvalidTopicName`] if the name normalizes to empty,
/// or [`DbError::Sqlx`] if either write fails.
pub async fn subscribe_by_name(
    pool: &PgPool,
    user_id: i64,
    name: &str,
    keywords: &str,
    profiles: &str,
    style: &SubscriptionStyle,
) -> Result<(SharedTopicRow, SubscriptionRow), DbError> {
    let mut tx = pool.begin().await?;
    let topic = find_or_create_with(&mut *tx, name, keywords, profiles).await?;
    let subscription = subscribe_with(&mut *tx, user_id, topic.id, style).await?;
    tx.commit().await?;
    Ok((topic, subscription))
}

pub(crate) async fn subscribe_with(
    conn: &mut PgConnection,
    user_id: i64,
    shared_topic_id: i64,
    style: &SubscriptionStyle,
) -> Result<SubscriptionRow, DbError> {
    let inserted = sqlx::query_as::<_, SubscriptionRow>(
        "INSERT INTO user_topic_subscriptions \
             (user_id, shared_topic_id, display_name, color, icon) \
         VALUES ($1, $2, $3, COALESCE($4, $6), COALESCE($5, $7)) \
         ON CONFLICT (user_id, shared_topic_id) DO NOTHING \
         RETURNING id, user_id, shared_topic_id, display_name, color, icon, \
                   last_viewed, subscribed_at",
    )
    .bind(user_id)
    .bind(shared_topic_id)
    .bind(style.display_name.as_deref())
    .bind(style.color.as_deref())
    .bind(style.icon.as_deref())
    .bind(DEFAULT_COLOR)
    .bind(DEFAULT_ICON)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = inserted {
        return Ok(row);
    }

    let existing = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT id, user_id, shared_topic_id, display_name, color, icon, \
                last_viewed, subscribed_at \
         FROM user_topic_subscriptions \
         WHERE user_id = $1 AND shared_topic_id = $2",
    )
    .bind(user_id)
    .bind(shared_topic_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(existing)
}

/// Removes a subscription. Returns `true` if a row was deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn unsubscribe_user_from_topic(
    pool: &PgPool,
    user_id: i64,
    shared_topic_id: i64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "DELETE FROM user_topic_subscriptions \
         WHERE user_id = $1 AND shared_topic_id = $2",
    )
    .bind(user_id)
    .bind(shared_topic_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Lists a user's subscriptions, newest first, with live post counts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_subscriptions(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<SubscriptionView>, DbError> {
    let rows = sqlx::query_as::<_, SubscriptionView>(
        "SELECT s.id AS subscription_id, \
                t.id AS shared_topic_id, \
                COALESCE(s.display_name, t.name) AS name, \
                t.name AS original_name, \
                s.color, s.icon, t.keywords, t.profiles, \
                s.last_viewed, s.subscribed_at, t.last_collected, t.collection_status, \
                (SELECT COUNT(*) FROM shared_posts p WHERE p.shared_topic_id = t.id) \
                    AS posts_count \
         FROM user_topic_subscriptions s \
         JOIN shared_topics t ON t.id = s.shared_topic_id \
         WHERE s.user_id = $1 \
         ORDER BY s.subscribed_at DESC, s.id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sets `last_viewed = NOW()`. Returns `false` when the user is not subscribed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_subscription_viewed(
    pool: &PgPool,
    user_id: i64,
    shared_topic_id: i64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE user_topic_subscriptions \
         SET last_viewed = NOW() \
         WHERE user_id = $1 AND shared_topic_id = $2",
    )
    .bind(user_id)
    .bind(shared_topic_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Updates the per-user display fields that are `Some` in `style`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the user is not subscribed, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_subscription_style(
    pool: &PgPool,
    user_id: i64,
    shared_topic_id: i64,
    style: &SubscriptionStyle,
) -> Result<SubscriptionRow, DbError> {
    sqlx::query_as::<_, SubscriptionRow>(
        "UPDATE user_topic_subscriptions \
         SET display_name = COALESCE($3, display_name), \
             color = COALESCE($4, color), \
             icon = COALESCE($5, icon) \
         WHERE user_id = $1 AND shared_topic_id = $2 \
         RETURNING id, user_id, shared_topic_id, display_name, color, icon, \
                   last_viewed, subscribed_at",
    )
    .bind(user_id)
    .bind(shared_topic_id)
    .bind(style.display_name.as_deref())
    .bind(style.color.as_deref())
    .bind(style.icon.as_deref())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
