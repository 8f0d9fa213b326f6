//! Subscribing a user to a topic by name.

use serde::Serialize;
use sqlx::PgPool;
use topicwatch_db::{subscribe_by_name, DbError, SharedTopicRow, SubscriptionRow, SubscriptionStyle};

#[derive(Debug, Clone, Serialize)]
pub struct Subscribed {
    pub topic_id: i64,
    pub topic_name: String,
    pub keywords: String,
    pub profiles: String,
    pub subscription_id: i64,
    /// The shared topic has never been collected; callers may want to
    /// trigger a first collection.
    pub needs_collection: bool,
}

impl Subscribed {
    fn from_rows(topic: &SharedTopicRow, subscription: &SubscriptionRow) -> Self {
        Self {
            topic_id: topic.id,
            topic_name: topic.name.clone(),
            keywords: topic.keywords.clone(),
            profiles: topic.profiles.clone(),
            subscription_id: subscription.id,
            needs_collection: topic.last_collected.is_none(),
        }
    }
}

/// Finds or creates the shared topic for `topic_name` (merging keywords and
/// profiles) and subscribes `user_id` to it. Both writes share one
/// transaction, so a failed subscribe leaves no new topic behind.
///
/// Subscribing again to a name that normalizes to the same topic returns
/// the existing subscription; the per-user style given here only applies
/// when the subscription is first created.
///
/// # Errors
///
/// Returns [`DbError::InvalidTopicName`] if the name normalizes to empty,
/// or [`DbError::Sqlx`] on store failure.
pub async fn subscribe(
    pool: &PgPool,
    user_id: i64,
    topic_name: &str,
    keywords: &str,
    profiles: &str,
    style: &SubscriptionStyle,
) -> Result<Subscribed, DbError> {
    let (topic, subscription) =
        subscribe_by_name(pool, user_id, topic_name, keywords, profiles, style).await?;

    tracing::info!(
        user_id,
        topic_id = topic.id,
        subscription_id = subscription.id,
        "subscribed user to shared topic"
    );

    Ok(Subscribed::from_rows(&topic, &subscription))
}
