//! Database operations for `users`: guests, email accounts, digest settings.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use topicwatch_core::DigestFrequency;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: Option<String>,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub digest_enabled: bool,
    pub digest_frequency: String,
    pub last_digest_sent: Option<DateTime<Utc>>,
}

impl UserRow {
    #[must_use]
    pub fn frequency(&self) -> DigestFrequency {
        DigestFrequency::from_stored(Some(&self.digest_frequency))
    }
}

/// Aggregate figures printed after a digest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestStats {
    pub registered_users: i64,
    pub digest_enabled_users: i64,
    pub users_with_email: i64,
    pub sent_last_24h: i64,
    /// `(frequency, user count)` for digest-enabled registered users.
    pub frequency_distribution: Vec<(String, i64)>,
}

/// Creates an anonymous guest user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_guest_user(pool: &PgPool) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (is_guest, last_login) \
         VALUES (true, NOW()) \
         RETURNING id, email, is_guest, created_at, last_login, \
                   digest_enabled, digest_frequency, last_digest_sent",
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no user has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_user(pool: &PgPool, id: i64) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, email, is_guest, created_at, last_login, \
                digest_enabled, digest_frequency, last_digest_sent \
         FROM users \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Resolves an email login to a user row.
///
/// An existing account with the email wins. Otherwise, when `upgrade_guest_id`
/// names a guest, that guest becomes the registered account and keeps its
/// subscriptions. Otherwise a new account is created. `last_login` is
/// stamped in every case.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn get_or_create_email_user(
    pool: &PgPool,
    email: &str,
    upgrade_guest_id: Option<i64>,
) -> Result<UserRow, DbError> {
    let email = email.trim().to_lowercase();
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET last_login = NOW() \
         WHERE email = $1 \
         RETURNING id, email, is_guest, created_at, last_login, \
                   digest_enabled, digest_frequency, last_digest_sent",
    )
    .bind(&email)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(row) = existing {
        tx.commit().await?;
        return Ok(row);
    }

    if let Some(guest_id) = upgrade_guest_id {
        let upgraded = sqlx::query_as::<_, UserRow>(
            "UPDATE users \
             SET email = $1, is_guest = false, last_login = NOW() \
             WHERE id = $2 AND is_guest \
             RETURNING id, email, is_guest, created_at, last_login, \
                       digest_enabled, digest_frequency, last_digest_sent",
        )
        .bind(&email)
        .bind(guest_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = upgraded {
            tx.commit().await?;
            return Ok(row);
        }
    }

    let created = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (email, is_guest, last_login) \
         VALUES ($1, false, NOW()) \
         RETURNING id, email, is_guest, created_at, last_login, \
                   digest_enabled, digest_frequency, last_digest_sent",
    )
    .bind(&email)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(created)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no user has `user_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_digest_preferences(
    pool: &PgPool,
    user_id: i64,
    enabled: bool,
    frequency: DigestFrequency,
) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(
        "UPDATE users \
         SET digest_enabled = $2, digest_frequency = $3 \
         WHERE id = $1 \
         RETURNING id, email, is_guest, created_at, last_login, \
                   digest_enabled, digest_frequency, last_digest_sent",
    )
    .bind(user_id)
    .bind(enabled)
    .bind(frequency.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Users who may receive a digest: enabled, with an email, not a guest.
///
/// When `user_ids` is `Some`, results are further restricted to those ids.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_digest_candidates(
    pool: &PgPool,
    user_ids: Option<&[i64]>,
) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, is_guest, created_at, last_login, \
                digest_enabled, digest_frequency, last_digest_sent \
         FROM users \
         WHERE digest_enabled \
           AND email IS NOT NULL \
           AND NOT is_guest \
           AND ($1::BIGINT[] IS NULL OR id = ANY($1)) \
         ORDER BY id",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_digest_sent(
    pool: &PgPool,
    user_id: i64,
    sent_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query("UPDATE users SET last_digest_sent = $2 WHERE id = $1")
        .bind(user_id)
        .bind(sent_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Deletes a user; subscriptions cascade. Legacy topics are left for the
/// orphan sweep.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_user(pool: &PgPool, user_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn digest_statistics(pool: &PgPool) -> Result<DigestStats, DbError> {
    let (registered_users, digest_enabled_users, users_with_email, sent_last_24h) =
        sqlx::query_as::<_, (i64, i64, i64, i64)>(
            "SELECT \
                COUNT(*) FILTER (WHERE NOT is_guest), \
                COUNT(*) FILTER (WHERE NOT is_guest AND digest_enabled), \
                COUNT(*) FILTER (WHERE NOT is_guest AND email IS NOT NULL), \
                COUNT(*) FILTER (WHERE last_digest_sent >= NOW() - INTERVAL '24 hours') \
             FROM users",
        )
        .fetch_one(pool)
        .await?;

    let frequency_distribution = sqlx::query_as::<_, (String, i64)>(
        "SELECT digest_frequency, COUNT(*) \
         FROM users \
         WHERE digest_enabled AND NOT is_guest \
         GROUP BY digest_frequency \
         ORDER BY digest_frequency",
    )
    .fetch_all(pool)
    .await?;

    Ok(DigestStats {
        registered_users,
        digest_enabled_users,
        users_with_email,
        sent_last_24h,
        frequency_distribution,
    })
}
