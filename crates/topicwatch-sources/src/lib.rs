//! Source fetchers for topic collection.
//!
//! Every source sits behind [`SourceFetcher`]. The collector treats them as
//! black boxes: each returns candidate posts plus error strings and never
//! fails outright.

mod client;
pub mod error;
pub mod feed;
mod fetcher;
pub mod media;
mod retry;
mod sources;

use std::sync::Arc;

use topicwatch_core::Source;

pub use client::{FeedClient, FetchConfig};
pub use error::SourceError;
pub use feed::{parse_rss_feed, strip_html, FeedItem};
pub use fetcher::{FetchOutcome, SourceFetcher};
pub use sources::{NewsFetcher, PhotosFetcher, SiteSearchFetcher};

/// One fetcher per [`Source`], sharing a single HTTP client.
///
/// # Errors
///
/// Returns [`SourceError`] if the HTTP client cannot be built.
pub fn default_fetchers(config: &FetchConfig) -> Result<Vec<Arc<dyn SourceFetcher>>, SourceError> {
    let client = FeedClient::new(config)?;

    let mut fetchers: Vec<Arc<dyn SourceFetcher>> = Vec::with_capacity(Source::ALL.len());
    for source in Source::ALL {
        match source {
            Source::News => fetchers.push(Arc::new(NewsFetcher::new(client.clone()))),
            Source::Photos => fetchers.push(Arc::new(PhotosFetcher::new(client.clone()))),
            social => {
                if let Some(fetcher) = SiteSearchFetcher::for_source(social, client.clone()) {
                    fetchers.push(Arc::new(fetcher));
                }
            }
        }
    }

    Ok(fetchers)
}
