mod collect;
mod digest;
mod maintenance;
mod topics;
mod users;

use clap::{Parser, Subcommand};

use crate::collect::CollectCommands;
use crate::digest::DigestCommands;
use crate::maintenance::{CleanupCommands, JobsCommands, LegacyCommands};
use crate::topics::TopicsCommands;
use crate::users::UsersCommands;

#[derive(Debug, Parser)]
#[command(name = "topicwatch-cli")]
#[command(about = "topicwatch command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database connectivity and schema
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run collection outside the scheduler
    Collect {
        #[command(subcommand)]
        command: CollectCommands,
    },
    /// Digest email runs and statistics
    Digest {
        #[command(subcommand)]
        command: DigestCommands,
    },
    /// Guest and orphan sweeps
    Cleanup {
        #[command(subcommand)]
        command: CleanupCommands,
    },
    /// Fold per-user legacy topics into the shared registry
    Legacy {
        #[command(subcommand)]
        command: LegacyCommands,
    },
    /// Shared topics and subscriptions
    Topics {
        #[command(subcommand)]
        command: TopicsCommands,
    },
    /// User accounts and digest preferences
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Persisted scheduler state
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("topicwatch-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = topicwatch_core::load_app_config()?;
    let pool = topicwatch_db::connect_pool(
        &config.database_url,
        topicwatch_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                topicwatch_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = topicwatch_db::run_migrations(&pool).await?;
                println!("migrations applied: {applied}");
            }
        },
        Commands::Collect { command } => collect::run(&pool, &config, command).await?,
        Commands::Digest { command } => digest::run(&pool, &config, command).await?,
        Commands::Cleanup { command } => maintenance::run_cleanup(&pool, &config, command).await?,
        Commands::Legacy { command } => maintenance::run_legacy(&pool, command).await?,
        Commands::Topics { command } => topics::run(&pool, command).await?,
        Commands::Users { command } => users::run(&pool, command).await?,
        Commands::Jobs { command } => maintenance::run_jobs(&pool, command).await?,
    }

    Ok(())
}
