use async_trait::async_trait;
use topicwatch_core::{FetchedPost, Source, TopicRef};

/// Result of one fetch: whatever was found plus human-readable errors.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub posts: Vec<FetchedPost>,
    pub errors: Vec<String>,
}

impl FetchOutcome {
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            posts: Vec::new(),
            errors: vec![error.into()],
        }
    }

    /// Nothing came back and at least one error was reported.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.posts.is_empty() && !self.errors.is_empty()
    }
}

/// A black-box collector for one source.
///
/// Implementations never fail outright: a source that cannot be reached
/// returns an empty post list and its errors.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self, topic: &TopicRef) -> FetchOutcome;
}
