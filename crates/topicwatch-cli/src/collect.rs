//! Collection command handlers for the CLI.
//!
//! Both subcommands build the same collector the server runs, so cooldown
//! and claim rules apply here too unless `--force` is given.

use std::sync::Arc;

use clap::Subcommand;
use topicwatch_collect::{CollectorConfig, SharedTopicCollector};
use topicwatch_sources::{default_fetchers, FetchConfig};

/// Sub-commands available under `collect`.
#[derive(Debug, Subcommand)]
pub enum CollectCommands {
    /// Collect every shared topic with at least one subscriber
    All {
        /// Ignore the scheduled cooldown
        #[arg(long)]
        force: bool,
    },
    /// Collect a single shared topic
    Topic {
        /// Shared topic id
        #[arg(long)]
        id: i64,
        /// Ignore the manual cooldown
        #[arg(long)]
        force: bool,
    },
}

fn build_collector(
    pool: &sqlx::PgPool,
    config: &topicwatch_core::AppConfig,
) -> anyhow::Result<SharedTopicCollector> {
    let fetchers: Vec<Arc<dyn topicwatch_sources::SourceFetcher>> =
        default_fetchers(&FetchConfig::from_app_config(config))
            .map_err(|e| anyhow::anyhow!("failed to build source fetchers: {e}"))?;
    Ok(SharedTopicCollector::new(
        pool.clone(),
        fetchers,
        CollectorConfig::from_app_config(config),
    ))
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &topicwatch_core::AppConfig,
    command: CollectCommands,
) -> anyhow::Result<()> {
    let collector = build_collector(pool, config)?;

    match command {
        CollectCommands::All { force } => {
            let summary = collector
                .collect_all_shared_topics(force, &|line: &str| println!("{line}"))
                .await;
            println!(
                "collected {} posts across {} topics ({} skipped)",
                summary.total_posts, summary.total_topics, summary.skipped_topics
            );
            for error in &summary.errors {
                eprintln!("error: {error}");
            }
        }
        CollectCommands::Topic { id, force } => {
            let outcome = collector.collect_one_topic(id, force).await?;
            if outcome.skipped {
                println!(
                    "topic {id} skipped: {}",
                    outcome.skip_reason.as_deref().unwrap_or("not due")
                );
                return Ok(());
            }
            println!(
                "topic {id}: {} new posts from {} sources",
                outcome.posts_collected,
                outcome.sources_processed.len()
            );
            for error in &outcome.errors {
                eprintln!("error: {error}");
            }
            if !outcome.success {
                anyhow::bail!("collection failed for topic {id}");
            }
        }
    }

    Ok(())
}
