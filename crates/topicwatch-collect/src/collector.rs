//! Multi-source collection for shared topics.
//!
//! A cycle claims each due topic (`collecting`), groups the topics by source,
//! fetches source groups concurrently, stores every candidate through the
//! URL-deduplicating post store, and then moves each topic to `completed` or
//! `failed`. Failures are reported as strings; nothing short of a panic in
//! this module aborts a cycle.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::PgPool;
use topicwatch_core::{canonicalize_post_url, summarize_errors, AppConfig, Source, TopicRef};
use topicwatch_db::DbError;
use topicwatch_sources::{FetchOutcome, SourceFetcher};

use crate::cooldown::CooldownPolicy;
use crate::error::CollectError;
use crate::plan::group_by_source;

/// Receives human-readable progress lines during a cycle.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

const MAX_STORED_ERRORS: usize = 10;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Cooldown for on-demand collection of a single topic.
    pub manual_cooldown: Duration,
    /// Cooldown applied by the scheduled all-topics cycle.
    pub scheduled_cooldown: Duration,
    /// Hard limit on one fetcher call for one topic.
    pub fetch_timeout: Duration,
    pub max_concurrent_sources: usize,
    /// A `collecting` claim older than this is considered abandoned.
    pub stale_after: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            manual_cooldown: Duration::from_secs(30 * 60),
            scheduled_cooldown: Duration::from_secs(55 * 60),
            fetch_timeout: Duration::from_secs(45),
            max_concurrent_sources: 3,
            stale_after: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            manual_cooldown: config.manual_cooldown(),
            scheduled_cooldown: config.scheduled_cooldown(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_concurrent_sources: config.max_concurrent_sources,
            ..Self::default()
        }
    }
}

/// Aggregate result of [`SharedTopicCollector::collect_all_shared_topics`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionSummary {
    pub total_topics: usize,
    pub total_posts: u64,
    pub errors: Vec<String>,
    pub sources_processed: Vec<Source>,
    /// Topics left alone because of cooldown or a live claim.
    pub skipped_topics: usize,
}

/// Result of [`SharedTopicCollector::collect_one_topic`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopicCollectionOutcome {
    pub topic_id: i64,
    pub success: bool,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub posts_collected: u64,
    pub sources_processed: Vec<Source>,
    pub errors: Vec<String>,
}

#[derive(Debug, Default)]
struct TopicTally {
    attempts: usize,
    failed_fetches: usize,
    stored: u64,
    errors: Vec<String>,
    store_failed: bool,
}

impl TopicTally {
    fn is_failure(&self) -> bool {
        self.store_failed
            || (self.attempts > 0 && self.failed_fetches == self.attempts && self.stored == 0)
    }

    fn absorb(&mut self, other: TopicTally) {
        self.attempts += other.attempts;
        self.failed_fetches += other.failed_fetches;
        self.stored += other.stored;
        self.errors.extend(other.errors);
        self.store_failed |= other.store_failed;
    }
}

struct GroupResult {
    source: Source,
    tallies: Vec<(i64, TopicTally)>,
    errors: Vec<String>,
}

#[derive(Default)]
struct CycleTally {
    topics: HashMap<i64, TopicTally>,
    errors: Vec<String>,
    sources_processed: Vec<Source>,
}

pub struct SharedTopicCollector {
    pool: PgPool,
    fetchers: HashMap<Source, Arc<dyn SourceFetcher>>,
    config: CollectorConfig,
}

impl SharedTopicCollector {
    #[must_use]
    pub fn new(
        pool: PgPool,
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        config: CollectorConfig,
    ) -> Self {
        let fetchers = fetchers.into_iter().map(|f| (f.source(), f)).collect();
        Self {
            pool,
            fetchers,
            config,
        }
    }

    /// Collects every shared topic that is due under the scheduled cooldown
    /// (all of them when `force` is set).
    ///
    /// Never fails: load, claim, fetch, and store problems are returned in
    /// [`CollectionSummary::errors`].
    pub async fn collect_all_shared_topics(
        &self,
        force: bool,
        progress: Progress<'_>,
    ) -> CollectionSummary {
        let mut summary = CollectionSummary::default();
        progress("Starting shared topic collection...");

        let rows = match topicwatch_db::list_shared_topics(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "collector: failed to load shared topics");
                summary
                    .errors
                    .push(format!("failed to load shared topics: {e}"));
                return summary;
            }
        };

        let now = Utc::now();
        let policy = CooldownPolicy::new(self.config.scheduled_cooldown);
        let mut claimed = Vec::new();
        for row in rows {
            if !policy.is_due(row.last_collected, now, force) {
                summary.skipped_topics += 1;
                continue;
            }
            match self.claim(row.id).await {
                Ok(true) => claimed.push(row.topic_ref()),
                Ok(false) => summary.skipped_topics += 1,
                Err(e) => {
                    tracing::warn!(topic_id = row.id, error = %e, "collector: claim failed");
                    summary
                        .errors
                        .push(format!("failed to start collection for {}: {e}", row.name));
                }
            }
        }

        if claimed.is_empty() {
            progress("No shared topics due for collection");
            return summary;
        }

        progress(&format!("Found {} shared topics to collect", claimed.len()));
        summary.total_topics = claimed.len();

        let cycle = self.run_cycle(&claimed, progress).await;
        summary.sources_processed = cycle.sources_processed;
        summary.errors.extend(cycle.errors);

        let mut tallies = cycle.topics;
        for topic in &claimed {
            let tally = tallies.remove(&topic.id).unwrap_or_default();
            summary.total_posts += tally.stored;
            summary.errors.extend(tally.errors.iter().cloned());
            if let Err(e) = self.finish(topic, &tally).await {
                tracing::error!(
                    topic_id = topic.id,
                    error = %e,
                    "collector: failed to record outcome"
                );
                summary
                    .errors
                    .push(format!("failed to record collection for {}: {e}", topic.name));
            }
        }

        progress(&format!(
            "Collection complete! {} new posts from {} sources",
            summary.total_posts,
            summary.sources_processed.len()
        ));
        tracing::info!(
            topics = summary.total_topics,
            posts = summary.total_posts,
            skipped = summary.skipped_topics,
            errors = summary.errors.len(),
            "collector: cycle complete"
        );

        summary
    }

    /// Collects one topic on demand, honouring the manual cooldown unless
    /// `force` is set. A skipped topic makes no fetcher calls.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::TopicNotFound`] for an unknown id, or
    /// [`CollectError::Db`] if the topic cannot be loaded or claimed.
    pub async fn collect_one_topic(
        &self,
        topic_id: i64,
        force: bool,
    ) -> Result<TopicCollectionOutcome, CollectError> {
        let row = match topicwatch_db::get_shared_topic(&self.pool, topic_id).await {
            Ok(row) => row,
            Err(DbError::NotFound) => return Err(CollectError::TopicNotFound(topic_id)),
            Err(e) => return Err(e.into()),
        };

        let mut outcome = TopicCollectionOutcome {
            topic_id,
            ..TopicCollectionOutcome::default()
        };

        let policy = CooldownPolicy::new(self.config.manual_cooldown);
        if let Some(remaining) = policy
            .remaining(row.last_collected, Utc::now())
            .filter(|_| !force)
        {
            outcome.skipped = true;
            outcome.skip_reason = Some(format!(
                "collected recently; next collection in {} minutes",
                remaining.as_secs().div_ceil(60)
            ));
            return Ok(outcome);
        }

        if !self.claim(topic_id).await? {
            outcome.skipped = true;
            outcome.skip_reason = Some("collection already in progress".to_string());
            return Ok(outcome);
        }

        let topic = row.topic_ref();
        let cycle = self
            .run_cycle(std::slice::from_ref(&topic), &|line: &str| {
                tracing::debug!(topic_id, "{line}");
            })
            .await;

        let mut tally = TopicTally::default();
        for (_, t) in cycle.topics {
            tally.absorb(t);
        }

        outcome.posts_collected = tally.stored;
        outcome.sources_processed = cycle.sources_processed;
        outcome.errors = cycle.errors;
        outcome.errors.extend(tally.errors.iter().cloned());
        outcome.success = !tally.is_failure();

        if let Err(e) = self.finish(&topic, &tally).await {
            tracing::error!(topic_id, error = %e, "collector: failed to record outcome");
            outcome
                .errors
                .push(format!("failed to record collection for {}: {e}", topic.name));
            outcome.success = false;
        }

        Ok(outcome)
    }

    async fn claim(&self, topic_id: i64) -> Result<bool, DbError> {
        let stale_before = TimeDelta::from_std(self.config.stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        topicwatch_db::begin_collection(&self.pool, topic_id, stale_before).await
    }

    async fn finish(&self, topic: &TopicRef, tally: &TopicTally) -> Result<(), DbError> {
        if tally.is_failure() {
            let message = if tally.errors.is_empty() {
                "no source returned results".to_string()
            } else {
                summarize_errors(&tally.errors, MAX_STORED_ERRORS)
            };
            tracing::warn!(topic_id = topic.id, "collector: topic collection failed");
            topicwatch_db::fail_collection(&self.pool, topic.id, &message).await
        } else {
            topicwatch_db::complete_collection(&self.pool, topic.id).await
        }
    }

    async fn run_cycle(&self, topics: &[TopicRef], progress: Progress<'_>) -> CycleTally {
        let groups = group_by_source(topics);
        let max_concurrent = self.config.max_concurrent_sources.max(1);

        let results: Vec<GroupResult> = stream::iter(groups)
            .map(|(source, group)| self.collect_source(source, group, progress))
            .buffer_unordered(max_concurrent)
            .collect()
            .await;

        let mut cycle = CycleTally::default();
        let mut processed = BTreeSet::new();
        for result in results {
            processed.insert(result.source);
            cycle.errors.extend(result.errors);
            for (topic_id, tally) in result.tallies {
                cycle.topics.entry(topic_id).or_default().absorb(tally);
            }
        }
        cycle.sources_processed = processed.into_iter().collect();
        cycle
    }

    async fn collect_source(
        &self,
        source: Source,
        topics: Vec<TopicRef>,
        progress: Progress<'_>,
    ) -> GroupResult {
        let mut result = GroupResult {
            source,
            tallies: Vec::with_capacity(topics.len()),
            errors: Vec::new(),
        };

        let Some(fetcher) = self.fetchers.get(&source) else {
            let message = format!("{} is unavailable: no fetcher configured", source.label());
            progress(&message);
            result.errors.push(message);
            for topic in &topics {
                let tally = TopicTally {
                    attempts: 1,
                    failed_fetches: 1,
                    ..TopicTally::default()
                };
                result.tallies.push((topic.id, tally));
            }
            return result;
        };

        progress(&format!(
            "Collecting from {} for {} topics",
            source.label(),
            topics.len()
        ));

        let mut stored_for_source = 0;
        for topic in topics {
            let outcome = self.fetch_isolated(fetcher, &topic).await;
            let tally = self.ingest(source, &topic, outcome).await;
            stored_for_source += tally.stored;
            result.tallies.push((topic.id, tally));
        }

        progress(&format!(
            "{}: {stored_for_source} posts collected",
            source.label()
        ));
        result
    }

    /// Runs one fetch in its own task so a hang becomes a timeout and a panic
    /// becomes an error, neither touching the rest of the cycle.
    async fn fetch_isolated(
        &self,
        fetcher: &Arc<dyn SourceFetcher>,
        topic: &TopicRef,
    ) -> FetchOutcome {
        let fetcher = Arc::clone(fetcher);
        let task_topic = topic.clone();
        let handle = tokio::spawn(async move { fetcher.fetch(&task_topic).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(self.config.fetch_timeout, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => FetchOutcome::failed(format!("fetcher crashed: {join_error}")),
            Err(_) => {
                abort.abort();
                FetchOutcome::failed(format!(
                    "timed out after {}s",
                    self.config.fetch_timeout.as_secs()
                ))
            }
        }
    }

    async fn ingest(&self, source: Source, topic: &TopicRef, outcome: FetchOutcome) -> TopicTally {
        let mut tally = TopicTally {
            attempts: 1,
            failed_fetches: usize::from(outcome.is_total_failure()),
            ..TopicTally::default()
        };

        for error in &outcome.errors {
            tally
                .errors
                .push(format!("{} error for {}: {error}", source.label(), topic.name));
        }

        for mut post in outcome.posts {
            let Some(url) = canonicalize_post_url(&post.url) else {
                tracing::debug!(
                    topic_id = topic.id,
                    source = %source,
                    url = %post.url,
                    "collector: dropping post without a usable url"
                );
                continue;
            };
            post.url = url;
            post.source = source;

            match topicwatch_db::create_shared_post(&self.pool, topic.id, &post).await {
                Ok(true) => tally.stored += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        topic_id = topic.id,
                        source = %source,
                        error = %e,
                        "collector: failed to store post"
                    );
                    tally.store_failed = true;
                    tally.errors.push(format!(
                        "{} store error for {}: {e}",
                        source.label(),
                        topic.name
                    ));
                    break;
                }
            }
        }

        tally
    }
}
