//! Source selection and grouping for a collection cycle.

use std::collections::{BTreeMap, BTreeSet};

use topicwatch_core::{Source, TopicRef};

/// Sources to fetch for one topic.
///
/// The baseline set always applies. Instagram, Facebook, and photo search
/// are added on loose substring matches against profiles and keywords, so a
/// topic may be fetched from a source that turns up nothing.
#[must_use]
pub fn sources_for_topic(topic: &TopicRef) -> BTreeSet<Source> {
    let keywords = topic.keywords.to_lowercase();
    let profiles = topic.profiles.to_lowercase();

    let mut sources: BTreeSet<Source> = Source::BASELINE.into_iter().collect();

    if profiles.contains("instagram") || keywords.contains("photo") {
        sources.insert(Source::Instagram);
    }
    if profiles.contains("facebook") {
        sources.insert(Source::Facebook);
    }
    if keywords.contains("photo") || keywords.contains("image") {
        sources.insert(Source::Photos);
    }

    sources
}

/// Inverts per-topic source sets into per-source topic lists. Each topic
/// appears at most once per source, in input order.
#[must_use]
pub fn group_by_source(topics: &[TopicRef]) -> BTreeMap<Source, Vec<TopicRef>> {
    let mut groups: BTreeMap<Source, Vec<TopicRef>> = BTreeMap::new();
    for topic in topics {
        for source in sources_for_topic(topic) {
            groups.entry(source).or_default().push(topic.clone());
        }
    }
    groups
}
