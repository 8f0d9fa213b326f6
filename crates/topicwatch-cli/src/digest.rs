//! Digest command handlers for the CLI.

use clap::Subcommand;
use topicwatch_digest::{
    parse_user_ids, run_digest_cycle, BrevoSender, DigestOptions, DigestReport, EmailSender,
    LogSender,
};

/// Sub-commands available under `digest`.
#[derive(Debug, Subcommand)]
pub enum DigestCommands {
    /// Send digests to every eligible user
    Send {
        /// Send regardless of each user's frequency
        #[arg(long)]
        force_send: bool,
        /// Restrict the run to these user ids (comma-separated)
        #[arg(long)]
        specific_user_ids: Option<String>,
        /// Do not record the send; pair with --test-email to redirect
        #[arg(long)]
        test_mode: bool,
        /// Deliver every message to this address instead
        #[arg(long, requires = "test_mode")]
        test_email: Option<String>,
    },
    /// Show digest statistics
    Stats,
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &topicwatch_core::AppConfig,
    command: DigestCommands,
) -> anyhow::Result<()> {
    match command {
        DigestCommands::Send {
            force_send,
            specific_user_ids,
            test_mode,
            test_email,
        } => {
            let specific_user_ids = specific_user_ids.as_deref().map(parse_user_ids);
            if specific_user_ids.as_ref().is_some_and(Vec::is_empty) {
                anyhow::bail!("--specific-user-ids contained no valid ids");
            }

            let options = DigestOptions {
                force: force_send,
                specific_user_ids,
                test_mode,
                test_email,
                ..DigestOptions::from_app_config(config)
            };

            let sender: Box<dyn EmailSender> = match &config.brevo {
                Some(brevo) => Box::new(BrevoSender::new(brevo)?),
                None => {
                    tracing::warn!("BREVO_API not set; digests will only be logged");
                    Box::new(LogSender)
                }
            };

            let report = run_digest_cycle(pool, sender.as_ref(), &options).await?;
            print_report(&report);
            run_stats(pool).await?;

            if report.exceeds_failure_threshold() {
                anyhow::bail!(
                    "{} of {} digest sends failed",
                    report.error_count,
                    report.attempts()
                );
            }
        }
        DigestCommands::Stats => run_stats(pool).await?,
    }

    Ok(())
}

fn print_report(report: &DigestReport) {
    println!(
        "digest: {} eligible, {} sent, {} failed, {} skipped",
        report.eligible,
        report.success_count,
        report.error_count,
        report.skipped.len()
    );
    for skipped in &report.skipped {
        println!(
            "  skipped user {} ({}): {}",
            skipped.user_id,
            skipped.email.as_deref().unwrap_or("no email"),
            skipped.reason
        );
    }
    for error in &report.errors {
        eprintln!("error: {error}");
    }
}

async fn run_stats(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let stats = topicwatch_db::digest_statistics(pool).await?;
    println!("registered users:     {}", stats.registered_users);
    println!("with email:           {}", stats.users_with_email);
    println!("digest enabled:       {}", stats.digest_enabled_users);
    println!("sent in last 24h:     {}", stats.sent_last_24h);
    for (frequency, count) in &stats.frequency_distribution {
        println!("  {frequency:<14}{count}");
    }
    Ok(())
}
