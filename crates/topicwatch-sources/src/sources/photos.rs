//! Photo search: news results for "{name} photos", flagged as photos.

use async_trait::async_trait;
use chrono::Utc;
use topicwatch_core::{FetchedPost, Source, TopicRef};

use crate::client::FeedClient;
use crate::fetcher::{FetchOutcome, SourceFetcher};

const ITEMS_PER_FEED: usize = 10;
const MAX_POSTS: usize = 8;

pub struct PhotosFetcher {
    client: FeedClient,
}

impl PhotosFetcher {
    #[must_use]
    pub fn new(client: FeedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for PhotosFetcher {
    fn source(&self) -> Source {
        Source::Photos
    }

    async fn fetch(&self, topic: &TopicRef) -> FetchOutcome {
        let query = format!("{} photos", topic.name.trim());

        let items = match self.client.google_news(&query, ITEMS_PER_FEED).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(topic = %topic.name, error = %e, "photo search failed");
                return FetchOutcome::failed(format!("photo search failed: {e}"));
            }
        };

        let posts = items
            .into_iter()
            .take(MAX_POSTS)
            .map(|item| {
                let content = if item.summary.is_empty() {
                    item.title.clone()
                } else {
                    item.summary
                };
                let mut post = FetchedPost::new(
                    Source::Photos,
                    content,
                    item.link,
                    item.published.unwrap_or_else(Utc::now),
                );
                post.title = (!item.title.is_empty()).then_some(item.title);
                post.image_url = item.image_url;
                post.is_photo = true;
                post
            })
            .collect();

        FetchOutcome {
            posts,
            errors: Vec::new(),
        }
    }
}
