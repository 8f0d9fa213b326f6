//! HTTP client for the RSS search endpoints every fetcher sits on.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, Url};
use topicwatch_core::AppConfig;

use crate::error::SourceError;
use crate::feed::{parse_rss_feed, FeedItem};
use crate::retry::retry_with_backoff;

const GOOGLE_NEWS_BASE_URL: &str = "https://news.google.com";
const BING_NEWS_BASE_URL: &str = "https://www.bing.com";
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Settings shared by all fetchers.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub google_news_base_url: String,
    pub bing_news_base_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            user_agent: "topicwatch/0.1 (+topic-monitoring)".to_string(),
            max_retries: 2,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            google_news_base_url: GOOGLE_NEWS_BASE_URL.to_string(),
            bing_news_base_url: BING_NEWS_BASE_URL.to_string(),
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            user_agent: config.fetch_user_agent.clone(),
            max_retries: config.fetch_max_retries,
            ..Self::default()
        }
    }

    /// Points both search endpoints at one base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.google_news_base_url = base_url.to_string();
        self.bing_news_base_url = base_url.to_string();
        self
    }
}

/// Thin wrapper over `reqwest` that runs Google News and Bing News RSS
/// searches with retry and returns parsed items. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    google_base: Url,
    bing_base: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl FeedClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SourceError::InvalidBaseUrl`] if either
    /// base URL does not parse.
    pub fn new(config: &FetchConfig) -> Result<Self, SourceError> {
        // The per-request timeout sits just under the collector's hard
        // timeout so a slow feed surfaces as an HTTP error first.
        let request_timeout = config.timeout.mul_f64(0.8).max(Duration::from_secs(1));
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            google_base: parse_base(&config.google_news_base_url)?,
            bing_base: parse_base(&config.bing_news_base_url)?,
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        })
    }

    /// Google News RSS search for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] on network failure or non-2xx status
    /// after retries, or [`SourceError::Xml`] on malformed RSS.
    pub async fn google_news(
        &self,
        query: &str,
        max_items: usize,
    ) -> Result<Vec<FeedItem>, SourceError> {
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC);
        let url = format!(
            "{}rss/search?q={encoded}&hl=en-US&gl=US&ceid=US:en",
            self.google_base
        );
        self.fetch_feed(&url, max_items).await
    }

    /// Bing News RSS search for `query`.
    ///
    /// # Errors
    ///
    /// Same as [`FeedClient::google_news`].
    pub async fn bing_news(
        &self,
        query: &str,
        max_items: usize,
    ) -> Result<Vec<FeedItem>, SourceError> {
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC);
        let url = format!("{}news/search?q={encoded}&format=RSS", self.bing_base);
        self.fetch_feed(&url, max_items).await
    }

    async fn fetch_feed(&self, url: &str, max_items: usize) -> Result<Vec<FeedItem>, SourceError> {
        let body = retry_with_backoff(self.max_retries, self.backoff_base_ms, || async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok::<_, SourceError>(response.text().await?)
        })
        .await?;

        parse_rss_feed(&body, max_items)
    }
}

/// Ensures the base URL ends with exactly one slash.
fn parse_base(base_url: &str) -> Result<Url, SourceError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|_| SourceError::InvalidBaseUrl(base_url.to_string()))
}
