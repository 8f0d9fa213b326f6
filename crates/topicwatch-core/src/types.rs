use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::split_csv;
use crate::CoreError;

/// An external provider that posts are collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    News,
    Reddit,
    Twitter,
    Instagram,
    Facebook,
    Youtube,
    Photos,
}

impl Source {
    pub const ALL: [Source; 7] = [
        Source::News,
        Source::Reddit,
        Source::Twitter,
        Source::Instagram,
        Source::Facebook,
        Source::Youtube,
        Source::Photos,
    ];

    /// Sources fetched for every topic regardless of its metadata.
    pub const BASELINE: [Source; 4] = [
        Source::News,
        Source::Reddit,
        Source::Twitter,
        Source::Youtube,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::News => "news",
            Source::Reddit => "reddit",
            Source::Twitter => "twitter",
            Source::Instagram => "instagram",
            Source::Facebook => "facebook",
            Source::Youtube => "youtube",
            Source::Photos => "photos",
        }
    }

    /// Human-facing label used in error strings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Source::News => "News",
            Source::Reddit => "Reddit",
            Source::Twitter => "Twitter",
            Source::Instagram => "Instagram",
            Source::Facebook => "Facebook",
            Source::Youtube => "YouTube",
            Source::Photos => "Photos",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::InvalidSource(s.to_string()))
    }
}

/// Per-topic collection state stored in `shared_topics.collection_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Idle,
    Collecting,
    Completed,
    Failed,
}

impl CollectionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionStatus::Idle => "idle",
            CollectionStatus::Collecting => "collecting",
            CollectionStatus::Completed => "completed",
            CollectionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CollectionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(CollectionStatus::Idle),
            "collecting" => Ok(CollectionStatus::Collecting),
            "completed" => Ok(CollectionStatus::Completed),
            "failed" => Ok(CollectionStatus::Failed),
            other => Err(CoreError::InvalidCollectionStatus(other.to_string())),
        }
    }
}

/// Lets row types decode the stored text column straight into the enum.
impl TryFrom<String> for CollectionStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The topic shape every source fetcher accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRef {
    pub id: i64,
    pub name: String,
    pub keywords: String,
    pub profiles: String,
}

impl TopicRef {
    #[must_use]
    pub fn keyword_list(&self) -> Vec<String> {
        split_csv(&self.keywords)
    }

    #[must_use]
    pub fn profile_list(&self) -> Vec<String> {
        split_csv(&self.profiles)
    }
}

/// A candidate post returned by a fetcher, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPost {
    pub source: Source,
    pub title: Option<String>,
    pub content: String,
    pub url: String,
    pub posted_at: DateTime<Utc>,
    pub likes: i32,
    pub comments: i32,
    pub image_url: Option<String>,
    pub is_photo: bool,
    pub subreddit: Option<String>,
}

impl FetchedPost {
    #[must_use]
    pub fn new(
        source: Source,
        content: impl Into<String>,
        url: impl Into<String>,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            title: None,
            content: content.into(),
            url: url.into(),
            posted_at,
            likes: 0,
            comments: 0,
            image_url: None,
            is_photo: false,
            subreddit: None,
        }
    }
}

/// How often a user wants the digest email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DigestFrequency {
    Daily,
    /// Every N days, N in `2..=6`.
    EveryNDays(u8),
}

impl DigestFrequency {
    #[must_use]
    pub fn days(self) -> u8 {
        match self {
            DigestFrequency::Daily => 1,
            DigestFrequency::EveryNDays(n) => n,
        }
    }

    #[must_use]
    pub fn interval(self) -> Duration {
        Duration::from_secs(u64::from(self.days()) * 24 * 3600)
    }

    /// Interpret a stored column value; missing or unknown values mean daily.
    #[must_use]
    pub fn from_stored(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok())
            .unwrap_or(DigestFrequency::Daily)
    }
}

impl fmt::Display for DigestFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestFrequency::Daily => f.write_str("daily"),
            DigestFrequency::EveryNDays(n) => write!(f, "every{n}days"),
        }
    }
}

impl FromStr for DigestFrequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "daily" {
            return Ok(DigestFrequency::Daily);
        }
        trimmed
            .strip_prefix("every")
            .and_then(|rest| rest.strip_suffix("days"))
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (2..=6).contains(n))
            .map(DigestFrequency::EveryNDays)
            .ok_or_else(|| CoreError::InvalidDigestFrequency(s.to_string()))
    }
}

impl From<DigestFrequency> for String {
    fn from(value: DigestFrequency) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for DigestFrequency {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
