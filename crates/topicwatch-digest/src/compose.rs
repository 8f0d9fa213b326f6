//! Plain HTML digest body, grouped by topic.

use std::collections::BTreeMap;

use topicwatch_db::DigestPostRow;

const TITLE_FALLBACK_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDigest {
    pub subject: String,
    pub html: String,
}

/// Builds the digest email for `posts` (already limited to the lookback
/// window). An empty list still produces a message saying so.
#[must_use]
pub fn compose_digest(posts: &[DigestPostRow], lookback_days: u32) -> ComposedDigest {
    let mut html = String::from("<html><body>\n<h1>Your topic digest</h1>\n");

    if posts.is_empty() {
        html.push_str(&format!(
            "<p>No new posts in the last {lookback_days} days.</p>\n"
        ));
    } else {
        html.push_str(&format!(
            "<p>{} new posts from the last {lookback_days} days.</p>\n",
            posts.len()
        ));

        let mut by_topic: BTreeMap<&str, Vec<&DigestPostRow>> = BTreeMap::new();
        for post in posts {
            by_topic.entry(post.topic_name.as_str()).or_default().push(post);
        }

        for (topic, topic_posts) in by_topic {
            html.push_str(&format!("<h2>{}</h2>\n<ul>\n", escape_html(topic)));
            for post in topic_posts {
                html.push_str(&format!(
                    "<li><a href=\"{}\">{}</a> <small>{} &middot; {}</small></li>\n",
                    escape_html(&post.url),
                    escape_html(&display_title(post)),
                    escape_html(&post.source),
                    post.posted_at.format("%Y-%m-%d %H:%M UTC"),
                ));
            }
            html.push_str("</ul>\n");
        }
    }

    html.push_str("</body></html>\n");

    ComposedDigest {
        subject: "Daily Digest".to_string(),
        html,
    }
}

fn display_title(post: &DigestPostRow) -> String {
    if let Some(title) = post.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.trim().to_string();
    }
    let content = post.content.trim();
    if content.chars().count() > TITLE_FALLBACK_CHARS {
        let head: String = content.chars().take(TITLE_FALLBACK_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
