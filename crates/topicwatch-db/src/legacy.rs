//! One-shot migration of per-user `topics`/`posts` into shared topics.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use topicwatch_core::{FetchedPost, Source};

use crate::shared_posts::insert_shared_post;
use crate::shared_topics::find_or_create_with;
use crate::subscriptions::{subscribe_with, SubscriptionStyle};
use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct LegacyTopicRow {
    id: i64,
    user_id: Option<i64>,
    name: String,
    keywords: String,
    profiles: String,
    color: String,
    icon: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LegacyPostRow {
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

impl LegacyPostRow {
    /// `None` for a source the shared store does not know.
    fn into_fetched(self) -> Option<FetchedPost> {
        let source = self.source.parse::<Source>().ok()?;
        Some(FetchedPost {
            source,
            title: self.title,
            content: self.content,
            url: self.url,
            posted_at: self.posted_at,
            likes: self.likes,
            comments: self.comments,
            image_url: self.image_url,
            is_photo: self.is_photo,
            subreddit: self.subreddit,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LegacyMigrationReport {
    pub migrated: usize,
    /// Topics without a live owner; left for the orphan sweep.
    pub skipped: usize,
    pub failed: usize,
    pub posts_copied: u64,
    pub errors: Vec<String>,
}

/// Folds every legacy topic into the shared registry.
///
/// For each legacy topic: find-or-create the shared topic, subscribe the
/// owner with the legacy name, color, and icon, copy posts whose canonical URL is
/// not yet stored, and refresh `posts_count`. Each topic runs in its own
/// transaction, so one bad topic is rolled back and reported without
/// affecting the rest. Safe to re-run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] only if the legacy topic list cannot be read.
pub async fn migrate_legacy_topics(pool: &PgPool) -> Result<LegacyMigrationReport, DbError> {
    let topics = sqlx::query_as::<_, LegacyTopicRow>(
        "SELECT t.id, t.user_id, t.name, t.keywords, t.profiles, t.color, t.icon \
         FROM topics t \
         ORDER BY t.id",
    )
    .fetch_all(pool)
    .await?;

    let mut report = LegacyMigrationReport::default();

    for topic in &topics {
        let Some(user_id) = topic.user_id else {
            report.skipped += 1;
            continue;
        };

        match migrate_one(pool, user_id, topic).await {
            Ok(Some(copied)) => {
                report.migrated += 1;
                report.posts_copied += copied;
                tracing::info!(
                    legacy_topic_id = topic.id,
                    user_id,
                    posts_copied = copied,
                    "legacy: migrated topic"
                );
            }
            Ok(None) => report.skipped += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(legacy_topic_id = topic.id, error = %e, "legacy: topic migration failed");
                report
                    .errors
                    .push(format!("Error migrating topic {}: {e}", topic.name));
            }
        }
    }

    Ok(report)
}

/// Returns `Ok(None)` when the owner no longer exists.
async fn migrate_one(
    pool: &PgPool,
    user_id: i64,
    topic: &LegacyTopicRow,
) -> Result<Option<u64>, DbError> {
    let mut tx = pool.begin().await?;

    let owner_exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
    if !owner_exists {
        return Ok(None);
    }

    let shared = find_or_create_with(&mut *tx, &topic.name, &topic.keywords, &topic.profiles)
        .await?;

    let style = SubscriptionStyle {
        display_name: Some(topic.name.clone()),
        color: Some(topic.color.clone()),
        icon: Some(topic.icon.clone()),
    };
    subscribe_with(&mut *tx, user_id, shared.id, &style).await?;

    let posts = sqlx::query_as::<_, LegacyPostRow>(
        "SELECT source, title, content, url, posted_at, likes, comments, \
                image_url, is_photo, subreddit \
         FROM posts \
         WHERE topic_id = $1 \
         ORDER BY id",
    )
    .bind(topic.id)
    .fetch_all(&mut *tx)
    .await?;

    let mut copied = 0;
    for row in posts {
        let Some(post) = row.into_fetched() else {
            continue;
        };
        // Uncanonicalizable URLs are dropped, like fetcher results.
        match insert_shared_post(&mut *tx, shared.id, &post).await {
            Ok(true) => copied += 1,
            Ok(false) | Err(DbError::InvalidPostUrl) => {}
            Err(e) => return Err(e),
        }
    }

    sqlx::query(
        "UPDATE shared_topics \
         SET posts_count = (SELECT COUNT(*) FROM shared_posts WHERE shared_topic_id = $1) \
         WHERE id = $1",
    )
    .bind(shared.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(copied))
}
