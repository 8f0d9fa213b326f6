//! URL helpers for thumbnails, inline images, and subreddit names.

use std::sync::LazyLock;

use regex::Regex;

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)([a-zA-Z0-9_-]{11})",
    )
    .expect("valid regex")
});

static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://[\w./%-]+\.(?:jpg|jpeg|png|webp))").expect("valid regex")
});

static SUBREDDIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"reddit\.com/r/([A-Za-z0-9_]+)").expect("valid regex"));

/// Extracts the 11-character video id from a YouTube watch, short, or embed URL.
#[must_use]
pub fn extract_youtube_id(url: &str) -> Option<&str> {
    YOUTUBE_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[must_use]
pub fn youtube_thumbnail(url: &str) -> Option<String> {
    extract_youtube_id(url).map(|id| format!("https://img.youtube.com/vi/{id}/hqdefault.jpg"))
}

/// First `http(s)` URL ending in a common image extension.
#[must_use]
pub fn extract_image_url(text: &str) -> Option<String> {
    IMAGE_URL
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[must_use]
pub fn subreddit_from_url(url: &str) -> Option<String> {
    SUBREDDIT
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
