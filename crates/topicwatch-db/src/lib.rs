use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use topicwatch_core::CollectionStatus;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/topicwatch-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &topicwatch_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("topic name '{0}' is empty after normalization")]
    InvalidTopicName(String),
    #[error("post url must be a non-empty http(s) url")]
    InvalidPostUrl,
    #[error("shared topic {id} is not in '{expected_status}' status")]
    InvalidStatusTransition {
        id: i64,
        expected_status: CollectionStatus,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations may not exist yet on a fresh database; absence counts as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}


pub mod cleanup;
pub mod collection_status;
pub mod legacy;
pub mod scheduled_jobs;
pub mod shared_posts;
pub mod shared_topics;
pub mod subscriptions;
pub mod users;

pub use cleanup::{cleanup_guests, cleanup_orphans, GuestSweep, OrphanSweep};
pub use collection_status::{begin_collection, complete_collection, fail_collection};
pub use legacy::{migrate_legacy_topics, LegacyMigrationReport};
pub use scheduled_jobs::{
    list_scheduled_jobs, record_job_finished, record_job_started, register_scheduled_job,
    ScheduledJobRow,
};
pub use shared_posts::{
    count_shared_topic_posts, create_shared_post, list_recent_posts_for_user,
    list_shared_topic_posts, DigestPostRow, SharedPostRow,
};
pub use shared_topics::{
    delete_shared_topic, find_exact_shared_topic, find_or_create_shared_topic, get_shared_topic,
    get_shared_topic_stats, list_shared_topics, search_shared_topics, SharedTopicRow,
    SharedTopicStats, TopicSearchRow,
};
pub use subscriptions::{
    list_user_subscriptions, mark_subscription_viewed, subscribe_by_name, subscribe_user_to_topic,
    unsubscribe_user_from_topic, update_subscription_style, SubscriptionRow, SubscriptionStyle,
    SubscriptionView,
};
pub use users::{
    create_guest_user, delete_user, digest_statistics, get_or_create_email_user, get_user,
    list_digest_candidates, mark_digest_sent, update_digest_preferences, DigestStats, UserRow,
};
