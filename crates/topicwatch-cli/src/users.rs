//! User account command handlers for the CLI.

use clap::Subcommand;
use topicwatch_core::DigestFrequency;

/// Sub-commands available under `users`.
#[derive(Debug, Subcommand)]
pub enum UsersCommands {
    /// Create an anonymous guest user
    Guest,
    /// Find or create a registered user by email
    Register {
        #[arg(long)]
        email: String,
        /// Guest to upgrade in place, keeping its subscriptions
        #[arg(long)]
        upgrade_guest: Option<i64>,
    },
    /// Change a user's digest preferences
    DigestPrefs {
        #[arg(long)]
        user_id: i64,
        /// Turn digests off instead of on
        #[arg(long)]
        disable: bool,
        /// `daily` or `every2days` through `every6days`
        #[arg(long, default_value = "daily")]
        frequency: DigestFrequency,
    },
    /// Delete a user and their subscriptions
    Delete {
        #[arg(long)]
        user_id: i64,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: UsersCommands) -> anyhow::Result<()> {
    match command {
        UsersCommands::Guest => {
            let user = topicwatch_db::create_guest_user(pool).await?;
            println!("created guest user {}", user.id);
        }
        UsersCommands::Register {
            email,
            upgrade_guest,
        } => {
            if !email.contains('@') {
                anyhow::bail!("'{email}' is not an email address");
            }
            let user = topicwatch_db::get_or_create_email_user(pool, &email, upgrade_guest).await?;
            println!(
                "user {} ({})",
                user.id,
                user.email.as_deref().unwrap_or_default()
            );
        }
        UsersCommands::DigestPrefs {
            user_id,
            disable,
            frequency,
        } => {
            let user =
                topicwatch_db::update_digest_preferences(pool, user_id, !disable, frequency)
                    .await?;
            println!(
                "user {}: digest {} ({})",
                user.id,
                if user.digest_enabled { "enabled" } else { "disabled" },
                user.frequency()
            );
        }
        UsersCommands::Delete { user_id } => {
            if !topicwatch_db::delete_user(pool, user_id).await? {
                anyhow::bail!("user {user_id} not found");
            }
            println!("deleted user {user_id}");
        }
    }
    Ok(())
}
