//! Topic and subscription command handlers for the CLI.

use clap::Subcommand;
use topicwatch_db::SubscriptionStyle;

/// Sub-commands available under `topics`.
#[derive(Debug, Subcommand)]
pub enum TopicsCommands {
    /// Subscribe a user to a topic by name
    Subscribe {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        name: String,
        /// Comma-separated keywords merged into the shared topic
        #[arg(long, default_value = "")]
        keywords: String,
        /// Comma-separated profile handles merged into the shared topic
        #[arg(long, default_value = "")]
        profiles: String,
        /// Name shown to this user instead of the shared one
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List a user's subscriptions
    List {
        #[arg(long)]
        user_id: i64,
    },
    /// Search shared topics by name or keyword
    Search {
        query: String,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Remove a user's subscription
    Unsubscribe {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        topic_id: i64,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: TopicsCommands) -> anyhow::Result<()> {
    match command {
        TopicsCommands::Subscribe {
            user_id,
            name,
            keywords,
            profiles,
            display_name,
        } => {
            match topicwatch_db::get_user(pool, user_id).await {
                Ok(_) => {}
                Err(topicwatch_db::DbError::NotFound) => {
                    anyhow::bail!("user {user_id} not found")
                }
                Err(e) => return Err(e.into()),
            }

            let style = SubscriptionStyle {
                display_name,
                ..SubscriptionStyle::default()
            };
            let subscribed =
                topicwatch_collect::subscribe(pool, user_id, &name, &keywords, &profiles, &style)
                    .await?;
            println!(
                "user {user_id} subscribed to '{}' (topic {})",
                subscribed.topic_name, subscribed.topic_id
            );
            if subscribed.needs_collection {
                println!(
                    "topic has never been collected; run `collect topic --id {}`",
                    subscribed.topic_id
                );
            }
        }
        TopicsCommands::List { user_id } => {
            let rows = topicwatch_db::list_user_subscriptions(pool, user_id).await?;
            if rows.is_empty() {
                println!("user {user_id} has no subscriptions");
                return Ok(());
            }
            println!("{:<8}{:<30}{:<8}{:<12}LAST COLLECTED", "TOPIC", "NAME", "POSTS", "STATUS");
            for row in &rows {
                let last = row.last_collected.map_or_else(
                    || "never".to_string(),
                    |at| at.format("%Y-%m-%d %H:%M").to_string(),
                );
                println!(
                    "{:<8}{:<30}{:<8}{:<12}{}",
                    row.shared_topic_id, row.name, row.posts_count, row.collection_status, last
                );
            }
        }
        TopicsCommands::Search { query, limit } => {
            let rows =
                topicwatch_db::search_shared_topics(pool, &query, limit.clamp(1, 200)).await?;
            if rows.is_empty() {
                println!("no topics match '{query}'");
                return Ok(());
            }
            println!("{:<8}{:<30}{:<8}{:<13}KEYWORDS", "ID", "NAME", "POSTS", "SUBSCRIBERS");
            for row in &rows {
                println!(
                    "{:<8}{:<30}{:<8}{:<13}{}",
                    row.id, row.name, row.posts_count, row.subscribers_count, row.keywords
                );
            }
        }
        TopicsCommands::Unsubscribe { user_id, topic_id } => {
            if topicwatch_db::unsubscribe_user_from_topic(pool, user_id, topic_id).await? {
                println!("user {user_id} unsubscribed from topic {topic_id}");
            } else {
                anyhow::bail!("user {user_id} is not subscribed to topic {topic_id}");
            }
        }
    }
    Ok(())
}
