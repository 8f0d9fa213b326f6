//! Background job dispatcher.
//!
//! One loop ticks on a fixed period, asks the [`JobTable`] which jobs are
//! due, and spawns each of them. A job never overlaps with itself: it is
//! not due again until its previous run has finished. Run state is mirrored
//! to `scheduled_jobs` so `next_run` survives a restart.

mod jobs;
mod table;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use topicwatch_db::DbError;

pub use jobs::{plan_jobs, run_job, JobContext, JobKind};
pub use table::{JobTable, Trigger};

const TICK: Duration = Duration::from_secs(30);

/// Keeps the dispatcher alive; dropping it stops scheduling new runs.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Registers every planned job, restores persisted `next_run` values, and
/// starts the dispatcher loop.
///
/// # Errors
///
/// Returns [`DbError`] if the jobs cannot be registered in `scheduled_jobs`.
pub async fn start_scheduler(ctx: JobContext) -> Result<SchedulerHandle, DbError> {
    let table = build_table(&ctx).await?;
    let table = Arc::new(Mutex::new(table));
    let ctx = Arc::new(ctx);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            dispatch_due(&table, &ctx).await;
        }
    });

    Ok(SchedulerHandle { task })
}

async fn build_table(ctx: &JobContext) -> Result<JobTable, DbError> {
    let now = Utc::now();
    let mut table = JobTable::new();

    for (kind, trigger) in plan_jobs(&ctx.config, ctx.sender.is_some()) {
        table.register(kind.id(), trigger, now);
        let Some(default_next_run) = table.get(kind.id()).map(|e| e.next_run) else {
            continue;
        };

        let stored = topicwatch_db::register_scheduled_job(
            &ctx.pool,
            kind.id(),
            &trigger.spec(),
            default_next_run,
        )
        .await?;
        table.restore(kind.id(), stored.last_run, stored.next_run);

        tracing::info!(
            job = kind.id(),
            trigger = %trigger.spec(),
            next_run = %stored.next_run,
            "scheduler: job registered"
        );
    }

    Ok(table)
}

/// Starts every due job that is not already running.
pub(crate) async fn dispatch_due(table: &Arc<Mutex<JobTable>>, ctx: &Arc<JobContext>) {
    let now = Utc::now();
    let started: Vec<&'static str> = {
        let mut guard = table.lock().await;
        let due = guard.due(now);
        due.into_iter()
            .filter(|id| guard.mark_started(id, now))
            .collect()
    };

    for job_id in started {
        let Some(kind) = JobKind::from_id(job_id) else {
            continue;
        };
        tokio::spawn(run_tracked(kind, now, Arc::clone(table), Arc::clone(ctx)));
    }
}

async fn run_tracked(
    kind: JobKind,
    started_at: chrono::DateTime<Utc>,
    table: Arc<Mutex<JobTable>>,
    ctx: Arc<JobContext>,
) {
    let job_id = kind.id();
    tracing::info!(job = job_id, "scheduler: job started");
    if let Err(e) = topicwatch_db::record_job_started(&ctx.pool, job_id, started_at).await {
        tracing::warn!(job = job_id, error = %e, "scheduler: failed to persist job start");
    }

    // The job runs in its own task so a panic is reported instead of
    // leaving the entry marked as running forever.
    let run_ctx = Arc::clone(&ctx);
    let result = match tokio::spawn(async move { run_job(kind, &run_ctx).await }).await {
        Ok(result) => result,
        Err(join_error) => Err(format!("job crashed: {join_error}")),
    };

    let finished_at = Utc::now();
    let next_run = table.lock().await.mark_finished(job_id, finished_at);

    match &result {
        Ok(()) => tracing::info!(job = job_id, "scheduler: job finished"),
        Err(e) => tracing::error!(job = job_id, error = %e, "scheduler: job failed"),
    }

    if let Some(next_run) = next_run {
        if let Err(e) = topicwatch_db::record_job_finished(
            &ctx.pool,
            job_id,
            result.as_ref().err().map(String::as_str),
            next_run,
        )
        .await
        {
            tracing::warn!(job = job_id, error = %e, "scheduler: failed to persist job outcome");
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
