//! Cleanup, legacy migration, and scheduler inspection commands.

use chrono::Utc;
use clap::Subcommand;

/// Sub-commands available under `cleanup`.
#[derive(Debug, Subcommand)]
pub enum CleanupCommands {
    /// Delete expired guest users and their legacy topics
    Guests,
    /// Delete shared and legacy topics nobody owns
    Orphans,
}

/// Sub-commands available under `legacy`.
#[derive(Debug, Subcommand)]
pub enum LegacyCommands {
    /// Move legacy topics into shared topics and subscriptions
    Migrate,
}

/// Sub-commands available under `jobs`.
#[derive(Debug, Subcommand)]
pub enum JobsCommands {
    /// Show every registered job and its last outcome
    List,
}

pub(crate) async fn run_cleanup(
    pool: &sqlx::PgPool,
    config: &topicwatch_core::AppConfig,
    command: CleanupCommands,
) -> anyhow::Result<()> {
    match command {
        CleanupCommands::Guests => {
            let sweep = topicwatch_db::cleanup_guests(pool, config.guest_ttl()).await?;
            println!(
                "deleted {} guest users and {} legacy topics",
                sweep.users_deleted, sweep.legacy_topics_deleted
            );
        }
        CleanupCommands::Orphans => {
            let sweep = topicwatch_db::cleanup_orphans(pool).await?;
            println!(
                "deleted {} shared topics and {} legacy topics",
                sweep.shared_topics_deleted, sweep.legacy_topics_deleted
            );
        }
    }
    Ok(())
}

pub(crate) async fn run_legacy(
    pool: &sqlx::PgPool,
    command: LegacyCommands,
) -> anyhow::Result<()> {
    match command {
        LegacyCommands::Migrate => {
            let report = topicwatch_db::migrate_legacy_topics(pool).await?;
            println!(
                "migrated {} topics ({} posts copied), {} skipped, {} failed",
                report.migrated, report.posts_copied, report.skipped, report.failed
            );
            for error in &report.errors {
                eprintln!("error: {error}");
            }
            if report.failed > 0 {
                anyhow::bail!("{} legacy topics failed to migrate", report.failed);
            }
        }
    }
    Ok(())
}

pub(crate) async fn run_jobs(pool: &sqlx::PgPool, command: JobsCommands) -> anyhow::Result<()> {
    match command {
        JobsCommands::List => {
            let jobs = topicwatch_db::list_scheduled_jobs(pool).await?;
            if jobs.is_empty() {
                println!("no jobs registered; start topicwatch-server first");
                return Ok(());
            }

            let now = Utc::now();
            println!(
                "{:<24}{:<16}{:<12}{:<22}ERROR",
                "JOB", "TRIGGER", "STATUS", "NEXT RUN"
            );
            for job in &jobs {
                let next = if job.next_run <= now {
                    "overdue".to_string()
                } else {
                    job.next_run.format("%Y-%m-%d %H:%M").to_string()
                };
                println!(
                    "{:<24}{:<16}{:<12}{:<22}{}",
                    job.job_id,
                    job.trigger_spec,
                    job.last_status.as_deref().unwrap_or("never"),
                    next,
                    job.last_error.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
