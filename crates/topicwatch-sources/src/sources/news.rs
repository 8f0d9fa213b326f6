//! News collector: Google News and Bing News RSS for the topic name.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use topicwatch_core::{FetchedPost, Source, TopicRef};

use crate::client::FeedClient;
use crate::feed::FeedItem;
use crate::fetcher::{FetchOutcome, SourceFetcher};

const ITEMS_PER_FEED: usize = 12;
const MAX_POSTS: usize = 20;

pub struct NewsFetcher {
    client: FeedClient,
}

impl NewsFetcher {
    #[must_use]
    pub fn new(client: FeedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for NewsFetcher {
    fn source(&self) -> Source {
        Source::News
    }

    async fn fetch(&self, topic: &TopicRef) -> FetchOutcome {
        let query = topic.name.trim();
        let mut outcome = FetchOutcome::default();
        let mut seen = HashSet::new();

        let feeds = [
            ("Google News", self.client.google_news(query, ITEMS_PER_FEED).await),
            ("Bing News", self.client.bing_news(query, ITEMS_PER_FEED).await),
        ];

        for (feed, result) in feeds {
            match result {
                Ok(items) => {
                    tracing::debug!(
                        topic = %topic.name,
                        feed,
                        count = items.len(),
                        "news feed fetched"
                    );
                    for item in items {
                        if outcome.posts.len() >= MAX_POSTS {
                            break;
                        }
                        if seen.insert(item.link.clone()) {
                            outcome.posts.push(news_post(item));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(topic = %topic.name, feed, error = %e, "news feed failed");
                    outcome.errors.push(format!("{feed} feed failed: {e}"));
                }
            }
        }

        outcome
    }
}

fn news_post(item: FeedItem) -> FetchedPost {
    let mut content = item.title.clone();
    if !item.summary.is_empty() && item.summary != item.title {
        if !content.is_empty() {
            content.push_str("\n\n");
        }
        content.push_str(&item.summary);
    }

    let mut post = FetchedPost::new(
        Source::News,
        content,
        item.link,
        item.published.unwrap_or_else(Utc::now),
    );
    post.title = (!item.title.is_empty()).then_some(item.title);
    post.image_url = item.image_url;
    post
}
