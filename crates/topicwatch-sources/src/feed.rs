//! RSS feed parsing and HTML stripping.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::error::SourceError;
use crate::media::extract_image_url;

/// One `<item>` from an RSS feed, with the description reduced to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    /// From `<enclosure>`/`<media:*>` when present, else the first image URL
    /// found in the raw description.
    pub image_url: Option<String>,
}

#[derive(Default)]
struct ItemBuilder {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    media_url: Option<String>,
}

impl ItemBuilder {
    fn finish(self) -> Option<FeedItem> {
        let link = self.link.trim().to_string();
        if link.is_empty() {
            return None;
        }
        let image_url = self
            .media_url
            .or_else(|| extract_image_url(&self.description));
        Some(FeedItem {
            title: self.title.trim().to_string(),
            link,
            summary: strip_html(&self.description),
            published: parse_pub_date(&self.pub_date),
            image_url,
        })
    }
}

/// Parse an RSS XML body into [`FeedItem`]s, stopping after `max_items`.
///
/// Items without a `<link>` are dropped.
///
/// # Errors
///
/// Returns [`SourceError::Xml`] if the XML is malformed.
pub fn parse_rss_feed(xml: &str, max_items: usize) -> Result<Vec<FeedItem>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut current_tag = String::new();

    loop {
        if items.len() >= max_items {
            break;
        }
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = tag_name(&e);
                if name == "item" {
                    current = Some(ItemBuilder::default());
                } else if let Some(item) = current.as_mut() {
                    capture_media(item, &name, &e);
                }
                current_tag = name;
            }
            Ok(Event::Empty(e)) => {
                if let Some(item) = current.as_mut() {
                    capture_media(item, &tag_name(&e), &e);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current.take().and_then(ItemBuilder::finish) {
                        items.push(item);
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Text(e)) => {
                if let Some(item) = current.as_mut() {
                    append_field(item, &current_tag, &text_of(&e));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(item) = current.as_mut() {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    append_field(item, &current_tag, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Xml(e)),
            _ => {}
        }
    }

    Ok(items)
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn text_of(e: &BytesText<'_>) -> String {
    // Unknown entities such as `&nbsp;` fail to unescape; keep the raw text.
    e.unescape()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned())
}

fn append_field(item: &mut ItemBuilder, tag: &str, text: &str) {
    let field = match tag {
        "title" => &mut item.title,
        "link" => &mut item.link,
        "description" | "summary" => &mut item.description,
        "pubDate" | "published" => &mut item.pub_date,
        _ => return,
    };
    if !field.is_empty() {
        field.push(' ');
    }
    field.push_str(text);
}

fn capture_media(item: &mut ItemBuilder, name: &str, e: &BytesStart<'_>) {
    if item.media_url.is_some()
        || !matches!(name, "enclosure" | "media:content" | "media:thumbnail")
    {
        return;
    }

    let mut url = None;
    let mut is_image = name == "media:thumbnail";
    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_default();
        match attr.key.as_ref() {
            b"url" => url = Some(value),
            b"type" | b"medium" => is_image |= value.starts_with("image"),
            _ => {}
        }
    }
    if is_image {
        item.media_url = url.filter(|u| !u.is_empty());
    }
}

/// Parse an RSS `pubDate` (RFC 2822), falling back to RFC 3339.
#[must_use]
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Strip HTML tags from a string and normalize whitespace.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
