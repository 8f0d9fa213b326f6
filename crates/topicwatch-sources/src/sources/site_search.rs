//! Social sources approximated with `site:` news searches.

use async_trait::async_trait;
use chrono::Utc;
use topicwatch_core::{FetchedPost, Source, TopicRef};

use crate::client::FeedClient;
use crate::feed::FeedItem;
use crate::fetcher::{FetchOutcome, SourceFetcher};
use crate::media::{extract_image_url, subreddit_from_url, youtube_thumbnail};

const ITEMS_PER_FEED: usize = 10;
const MAX_POSTS: usize = 8;

/// Fetches one social source by restricting a Google News search to that
/// site's domain.
pub struct SiteSearchFetcher {
    source: Source,
    site: &'static str,
    client: FeedClient,
}

impl SiteSearchFetcher {
    /// Returns `None` for sources that are not site searches (news, photos).
    #[must_use]
    pub fn for_source(source: Source, client: FeedClient) -> Option<Self> {
        site_for(source).map(|site| Self {
            source,
            site,
            client,
        })
    }
}

fn site_for(source: Source) -> Option<&'static str> {
    match source {
        Source::Twitter => Some("twitter.com"),
        Source::Reddit => Some("reddit.com"),
        Source::Youtube => Some("youtube.com"),
        Source::Instagram => Some("instagram.com"),
        Source::Facebook => Some("facebook.com"),
        Source::News | Source::Photos => None,
    }
}

#[async_trait]
impl SourceFetcher for SiteSearchFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, topic: &TopicRef) -> FetchOutcome {
        let query = format!("site:{} {}", self.site, topic.name.trim());

        match self.client.google_news(&query, ITEMS_PER_FEED).await {
            Ok(items) => FetchOutcome {
                posts: items
                    .into_iter()
                    .take(MAX_POSTS)
                    .map(|item| site_post(self.source, item))
                    .collect(),
                errors: Vec::new(),
            },
            Err(e) => {
                tracing::warn!(
                    topic = %topic.name,
                    source = %self.source,
                    error = %e,
                    "site search failed"
                );
                FetchOutcome::failed(format!("{} search failed: {e}", self.site))
            }
        }
    }
}

fn site_post(source: Source, item: FeedItem) -> FetchedPost {
    let content = if item.summary.is_empty() {
        item.title.clone()
    } else {
        item.summary.clone()
    };

    let image_url = match source {
        Source::Youtube => youtube_thumbnail(&item.link).or(item.image_url),
        _ => item.image_url.or_else(|| extract_image_url(&content)),
    };
    let subreddit = match source {
        Source::Reddit => subreddit_from_url(&item.link),
        _ => None,
    };

    let mut post = FetchedPost::new(
        source,
        content,
        item.link,
        item.published.unwrap_or_else(Utc::now),
    );
    post.title = (!item.title.is_empty()).then_some(item.title);
    post.image_url = image_url;
    post.subreddit = subreddit;
    post
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: &str) -> FeedItem {
        FeedItem {
            title: "A title".to_string(),
            link: link.to_string(),
            summary: String::new(),
            published: None,
            image_url: None,
        }
    }

    #[test]
    fn only_social_sources_have_sites() {
        assert_eq!(site_for(Source::Twitter), Some("twitter.com"));
        assert_eq!(site_for(Source::Facebook), Some("facebook.com"));
        assert_eq!(site_for(Source::News), None);
        assert_eq!(site_for(Source::Photos), None);
    }

    #[test]
    fn youtube_posts_get_thumbnails() {
        let post = site_post(Source::Youtube, item("https://youtu.be/dQw4w9WgXcQ"));
        assert_eq!(
            post.image_url.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
        assert_eq!(post.source, Source::Youtube);
    }

    #[test]
    fn reddit_posts_carry_subreddit() {
        let post = site_post(
            Source::Reddit,
            item("https://www.reddit.com/r/rust/comments/abc/x/"),
        );
        assert_eq!(post.subreddit.as_deref(), Some("rust"));
    }

    #[test]
    fn empty_summary_falls_back_to_title() {
        let post = site_post(Source::Twitter, item("https://twitter.com/x/status/1"));
        assert_eq!(post.content, "A title");
        assert!(post.subreddit.is_none());
    }
}
