//! The recurring jobs and what each one runs.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use topicwatch_collect::SharedTopicCollector;
use topicwatch_core::AppConfig;
use topicwatch_digest::{run_digest_cycle, DigestOptions, EmailSender};

use super::table::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    CollectSharedTopics,
    CleanupGuests,
    CleanupOrphans,
    SendDigests,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::CollectSharedTopics,
        JobKind::CleanupGuests,
        JobKind::CleanupOrphans,
        JobKind::SendDigests,
    ];

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            JobKind::CollectSharedTopics => "collect_shared_topics",
            JobKind::CleanupGuests => "cleanup_guests",
            JobKind::CleanupOrphans => "cleanup_orphans",
            JobKind::SendDigests => "send_digests",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// Everything a job needs. Cheap to share across spawned runs.
pub struct JobContext {
    pub pool: PgPool,
    pub collector: Arc<SharedTopicCollector>,
    /// `None` when no email transport is configured; the digest job is not
    /// registered in that case.
    pub sender: Option<Arc<dyn EmailSender>>,
    pub config: Arc<AppConfig>,
}

/// Jobs to register and their triggers, from config.
#[must_use]
pub fn plan_jobs(config: &AppConfig, has_sender: bool) -> Vec<(JobKind, Trigger)> {
    let mut jobs = vec![
        (
            JobKind::CollectSharedTopics,
            Trigger::Every(Duration::from_secs(config.collect_interval_mins * 60)),
        ),
        (
            JobKind::CleanupGuests,
            Trigger::Every(Duration::from_secs(
                config.guest_cleanup_interval_hours * 3600,
            )),
        ),
        (
            JobKind::CleanupOrphans,
            Trigger::Every(Duration::from_secs(
                config.orphan_cleanup_interval_hours * 3600,
            )),
        ),
    ];
    if has_sender {
        jobs.push((
            JobKind::SendDigests,
            Trigger::Every(Duration::from_secs(config.digest_interval_hours * 3600)),
        ));
    }
    jobs
}

/// Runs one job to completion. `Err` carries the message stored as the
/// job's `last_error`.
pub async fn run_job(kind: JobKind, ctx: &JobContext) -> Result<(), String> {
    match kind {
        JobKind::CollectSharedTopics => {
            let summary = ctx
                .collector
                .collect_all_shared_topics(false, &|line: &str| {
                    tracing::debug!("scheduler: {line}");
                })
                .await;
            tracing::info!(
                topics = summary.total_topics,
                posts = summary.total_posts,
                skipped = summary.skipped_topics,
                errors = summary.errors.len(),
                "scheduler: collection cycle finished"
            );
            Ok(())
        }
        JobKind::CleanupGuests => {
            let sweep = topicwatch_db::cleanup_guests(&ctx.pool, ctx.config.guest_ttl())
                .await
                .map_err(|e| e.to_string())?;
            tracing::info!(
                users = sweep.users_deleted,
                legacy_topics = sweep.legacy_topics_deleted,
                "scheduler: guest cleanup finished"
            );
            Ok(())
        }
        JobKind::CleanupOrphans => {
            let sweep = topicwatch_db::cleanup_orphans(&ctx.pool)
                .await
                .map_err(|e| e.to_string())?;
            tracing::info!(
                shared_topics = sweep.shared_topics_deleted,
                legacy_topics = sweep.legacy_topics_deleted,
                "scheduler: orphan cleanup finished"
            );
            Ok(())
        }
        JobKind::SendDigests => {
            let Some(sender) = ctx.sender.as_deref() else {
                return Err("no email transport configured".to_string());
            };
            let options = DigestOptions::from_app_config(&ctx.config);
            let report = run_digest_cycle(&ctx.pool, sender, &options)
                .await
                .map_err(|e| e.to_string())?;
            if report.exceeds_failure_threshold() {
                return Err(format!(
                    "{} of {} digest sends failed",
                    report.error_count,
                    report.attempts()
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(JobKind::from_id("daily_collection"), None);
    }
}
