//! Lifecycle sweeps for expired guests and orphaned topics.
//!
//! Each sweep runs in one transaction: either every delete in the sweep
//! lands or none does. Both are safe to re-run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuestSweep {
    pub users_deleted: u64,
    pub legacy_topics_deleted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanSweep {
    pub shared_topics_deleted: u64,
    pub legacy_topics_deleted: u64,
}

/// Deletes guest users created at or before `now - ttl`, together with
/// their legacy topics and posts. Subscriptions go with the user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is deleted in
/// that case.
pub async fn cleanup_guests(pool: &PgPool, ttl: Duration) -> Result<GuestSweep, DbError> {
    let cutoff = cutoff_before(Utc::now(), ttl);
    let mut tx = pool.begin().await?;

    let legacy = sqlx::query(
        "DELETE FROM topics \
         WHERE user_id IN (SELECT id FROM users WHERE is_guest AND created_at <= $1)",
    )
    .bind(cutoff)
    .execute(&mut *tx)
    .await?;

    let users = sqlx::query("DELETE FROM users WHERE is_guest AND created_at <= $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let sweep = GuestSweep {
        users_deleted: users.rows_affected(),
        legacy_topics_deleted: legacy.rows_affected(),
    };
    tracing::info!(
        users = sweep.users_deleted,
        legacy_topics = sweep.legacy_topics_deleted,
        "cleanup: guest sweep complete"
    );
    Ok(sweep)
}

/// Deletes every shared topic nobody subscribes to, whatever its age (its
/// posts cascade), and legacy topics whose owner is gone. Subscribing
/// creates the topic and the subscription in one transaction, so no
/// half-subscribed topic is visible to this sweep.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is deleted in
/// that case.
pub async fn cleanup_orphans(pool: &PgPool) -> Result<OrphanSweep, DbError> {
    let mut tx = pool.begin().await?;

    let shared = sqlx::query(
        "DELETE FROM shared_topics t \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM user_topic_subscriptions s WHERE s.shared_topic_id = t.id \
         )",
    )
    .execute(&mut *tx)
    .await?;

    let legacy = sqlx::query(
        "DELETE FROM topics t \
         WHERE t.user_id IS NULL \
            OR NOT EXISTS (SELECT 1 FROM users u WHERE u.id = t.user_id)",
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let sweep = OrphanSweep {
        shared_topics_deleted: shared.rows_affected(),
        legacy_topics_deleted: legacy.rows_affected(),
    };
    tracing::info!(
        shared_topics = sweep.shared_topics_deleted,
        legacy_topics = sweep.legacy_topics_deleted,
        "cleanup: orphan sweep complete"
    );
    Ok(sweep)
}

fn cutoff_before(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_subtracts_age() {
        let now = Utc::now();
        let cutoff = cutoff_before(now, Duration::from_secs(24 * 3600));
        assert_eq!((now - cutoff).num_hours(), 24);
    }

    #[test]
    fn cutoff_saturates_for_huge_ages() {
        let cutoff = cutoff_before(Utc::now(), Duration::from_secs(u64::MAX));
        assert_eq!(cutoff, DateTime::<Utc>::MIN_UTC);
    }
}
