//! Persistence for the background job table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `scheduled_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledJobRow {
    pub job_id: String,
    pub trigger_spec: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub last_status: Option<String>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Registers a job at startup and returns its stored row.
///
/// A job seen before keeps its `next_run` as long as its trigger is
/// unchanged; a new or re-triggered job takes `default_next_run`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn register_scheduled_job(
    pool: &PgPool,
    job_id: &str,
    trigger_spec: &str,
    default_next_run: DateTime<Utc>,
) -> Result<ScheduledJobRow, DbError> {
    let row = sqlx::query_as::<_, ScheduledJobRow>(
        "INSERT INTO scheduled_jobs (job_id, trigger_spec, next_run) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (job_id) DO UPDATE \
         SET next_run = CASE \
                 WHEN scheduled_jobs.trigger_spec = EXCLUDED.trigger_spec \
                 THEN scheduled_jobs.next_run \
                 ELSE EXCLUDED.next_run \
             END, \
             trigger_spec = EXCLUDED.trigger_spec, \
             updated_at = NOW() \
         RETURNING job_id, trigger_spec, last_run, next_run, last_status, last_error, updated_at",
    )
    .bind(job_id)
    .bind(trigger_spec)
    .bind(default_next_run)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the job was never registered, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_job_started(
    pool: &PgPool,
    job_id: &str,
    started_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scheduled_jobs \
         SET last_run = $2, last_status = 'running', last_error = NULL, updated_at = NOW() \
         WHERE job_id = $1",
    )
    .bind(job_id)
    .bind(started_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Records the outcome of a run and the next time it is due.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the job was never registered, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_job_finished(
    pool: &PgPool,
    job_id: &str,
    error: Option<&str>,
    next_run: DateTime<Utc>,
) -> Result<(), DbError> {
    let status = if error.is_some() {
        "failed"
    } else {
        "succeeded"
    };

    let result = sqlx::query(
        "UPDATE scheduled_jobs \
         SET last_status = $2, last_error = $3, next_run = $4, updated_at = NOW() \
         WHERE job_id = $1",
    )
    .bind(job_id)
    .bind(status)
    .bind(error)
    .bind(next_run)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scheduled_jobs(pool: &PgPool) -> Result<Vec<ScheduledJobRow>, DbError> {
    let rows = sqlx::query_as::<_, ScheduledJobRow>(
        "SELECT job_id, trigger_spec, last_run, next_run, last_status, last_error, updated_at \
         FROM scheduled_jobs \
         ORDER BY job_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
