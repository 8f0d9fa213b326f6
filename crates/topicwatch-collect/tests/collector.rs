//! Live collector tests: fake fetchers against a fresh database per test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use topicwatch_collect::{subscribe, CollectError, CollectorConfig, SharedTopicCollector};
use topicwatch_core::{CollectionStatus, FetchedPost, Source, TopicRef};
use topicwatch_db::{
    create_guest_user, find_exact_shared_topic, find_or_create_shared_topic, get_shared_topic,
    list_shared_topic_posts, DbError, SubscriptionStyle,
};
use topicwatch_sources::{FetchOutcome, SourceFetcher};

// ---------------------------------------------------------------------------
// Fake fetchers
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Behavior {
    /// Returns `count` posts whose URLs are built from the topic id.
    Posts(usize),
    /// Returns the same fixed URL for every topic.
    FixedUrl(&'static str),
    Fail(&'static str),
    /// Fails only for the named topic; other topics get one post.
    FailFor(&'static str),
    Hang,
    Panic,
}

struct FakeFetcher {
    source: Source,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl FakeFetcher {
    fn new(source: Source, behavior: Behavior) -> Self {
        Self {
            source,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, topic: &TopicRef) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Posts(count) => FetchOutcome {
                posts: (0..*count)
                    .map(|n| {
                        let url = format!(
                            "https://{}.example.com/{}/{n}?utm_source=feed",
                            self.source, topic.id
                        );
                        // Source is deliberately wrong; the collector stamps its own.
                        FetchedPost::new(Source::News, format!("post {n}"), url, Utc::now())
                    })
                    .collect(),
                errors: Vec::new(),
            },
            Behavior::FixedUrl(url) => FetchOutcome {
                posts: vec![FetchedPost::new(self.source, "shared", *url, Utc::now())],
                errors: Vec::new(),
            },
            Behavior::Fail(message) => FetchOutcome::failed(*message),
            Behavior::FailFor(name) if topic.name == *name => {
                FetchOutcome::failed("upstream 503")
            }
            Behavior::FailFor(_) => FetchOutcome {
                posts: vec![FetchedPost::new(
                    self.source,
                    "only post",
                    format!("https://{}.example.com/{}/only", self.source, topic.id),
                    Utc::now(),
                )],
                errors: Vec::new(),
            },
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                FetchOutcome::default()
            }
            Behavior::Panic => panic!("fetcher blew up"),
        }
    }
}

fn test_config() -> CollectorConfig {
    CollectorConfig {
        fetch_timeout: Duration::from_secs(5),
        ..CollectorConfig::default()
    }
}

/// One fetcher per baseline source, all with the same behavior.
fn baseline(behavior: &Behavior) -> Vec<Arc<FakeFetcher>> {
    Source::BASELINE
        .into_iter()
        .map(|source| Arc::new(FakeFetcher::new(source, behavior.clone())))
        .collect()
}

fn as_dyn(fetchers: &[Arc<FakeFetcher>]) -> Vec<Arc<dyn SourceFetcher>> {
    fetchers
        .iter()
        .map(|f| Arc::clone(f) as Arc<dyn SourceFetcher>)
        .collect()
}

fn total_calls(fetchers: &[Arc<FakeFetcher>]) -> usize {
    fetchers.iter().map(|f| f.calls.load(Ordering::SeqCst)).sum()
}

fn no_progress(_: &str) {}

async fn create_topic(pool: &sqlx::PgPool, name: &str) -> i64 {
    find_or_create_shared_topic(pool, name, "", "")
        .await
        .unwrap_or_else(|e| panic!("create_topic failed for '{name}': {e}"))
        .id
}

// ---------------------------------------------------------------------------
// Scheduled cycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn collect_all_stores_posts_and_completes_topics(pool: sqlx::PgPool) {
    let a = create_topic(&pool, "rust language").await;
    let b = create_topic(&pool, "tokio runtime").await;

    let fetchers = baseline(&Behavior::Posts(2));
    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());

    let lines = std::sync::Mutex::new(Vec::new());
    let progress = |line: &str| lines.lock().expect("progress lock").push(line.to_string());
    let summary = collector.collect_all_shared_topics(false, &progress).await;

    assert_eq!(summary.total_topics, 2);
    assert_eq!(summary.skipped_topics, 0);
    assert_eq!(summary.total_posts, 16, "2 topics x 4 sources x 2 posts");
    assert!(summary.errors.is_empty(), "errors: {:?}", summary.errors);
    assert_eq!(summary.sources_processed, Source::BASELINE.to_vec());
    assert_eq!(total_calls(&fetchers), 8);

    for id in [a, b] {
        let row = get_shared_topic(&pool, id).await.expect("topic");
        assert_eq!(row.collection_status, CollectionStatus::Completed);
        assert_eq!(row.posts_count, 8);
        assert!(row.last_collected.is_some());
        assert!(row.collection_errors.is_none());
    }

    let posts = list_shared_topic_posts(&pool, a, 50, 0).await.expect("posts");
    assert!(posts.iter().all(|p| !p.url.contains("utm_source")));
    let reddit = posts.iter().filter(|p| p.source == "reddit").count();
    assert_eq!(reddit, 2, "collector stamps the fetcher's source on each post");

    let lines = lines.into_inner().expect("progress lock");
    assert!(lines.iter().any(|l| l.contains("Found 2 shared topics")));
    assert!(lines.iter().any(|l| l.starts_with("Collection complete!")));
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_cycle_inside_cooldown_makes_no_fetch_calls(pool: sqlx::PgPool) {
    create_topic(&pool, "rust language").await;

    let fetchers = baseline(&Behavior::Posts(1));
    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());

    collector.collect_all_shared_topics(false, &no_progress).await;
    let calls_after_first = total_calls(&fetchers);
    assert_eq!(calls_after_first, 4);

    let summary = collector.collect_all_shared_topics(false, &no_progress).await;
    assert_eq!(summary.total_topics, 0);
    assert_eq!(summary.skipped_topics, 1);
    assert_eq!(total_calls(&fetchers), calls_after_first);

    let forced = collector.collect_all_shared_topics(true, &no_progress).await;
    assert_eq!(forced.total_topics, 1);
    assert_eq!(total_calls(&fetchers), calls_after_first + 4);
    assert_eq!(forced.total_posts, 0, "same URLs are not stored twice");
}

#[sqlx::test(migrations = "../../migrations")]
async fn same_url_from_two_topics_is_stored_once(pool: sqlx::PgPool) {
    create_topic(&pool, "alpha").await;
    create_topic(&pool, "beta").await;

    let fetcher = Arc::new(FakeFetcher::new(
        Source::News,
        Behavior::FixedUrl("https://example.com/shared#top"),
    ));
    let mut fetchers = baseline(&Behavior::Posts(0));
    fetchers.retain(|f| f.source != Source::News);
    fetchers.push(fetcher);

    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    let summary = collector.collect_all_shared_topics(false, &no_progress).await;

    assert_eq!(summary.total_posts, 1);
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shared_posts WHERE url = $1")
        .bind("https://example.com/shared")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(stored, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn partial_failure_still_completes(pool: sqlx::PgPool) {
    let id = create_topic(&pool, "rust language").await;

    let mut fetchers = baseline(&Behavior::Posts(1));
    fetchers.retain(|f| f.source != Source::Twitter);
    fetchers.push(Arc::new(FakeFetcher::new(
        Source::Twitter,
        Behavior::Fail("rate limited"),
    )));

    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    let summary = collector.collect_all_shared_topics(false, &no_progress).await;

    assert_eq!(summary.total_posts, 3);
    assert_eq!(
        summary.errors,
        vec!["Twitter error for rust language: rate limited".to_string()]
    );

    let row = get_shared_topic(&pool, id).await.expect("topic");
    assert_eq!(row.collection_status, CollectionStatus::Completed);
    assert_eq!(row.posts_count, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failure_on_one_topic_does_not_block_another_on_same_source(pool: sqlx::PgPool) {
    let a = create_topic(&pool, "alpha").await;
    let b = create_topic(&pool, "beta").await;

    let mut fetchers = baseline(&Behavior::Posts(0));
    fetchers.retain(|f| f.source != Source::Reddit);
    fetchers.push(Arc::new(FakeFetcher::new(
        Source::Reddit,
        Behavior::FailFor("alpha"),
    )));

    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    let summary = collector.collect_all_shared_topics(false, &no_progress).await;

    assert_eq!(summary.total_posts, 1);
    assert_eq!(
        summary.errors,
        vec!["Reddit error for alpha: upstream 503".to_string()]
    );

    let beta_posts = list_shared_topic_posts(&pool, b, 10, 0).await.expect("posts");
    assert_eq!(beta_posts.len(), 1);
    assert_eq!(beta_posts[0].source, "reddit");
    let beta = get_shared_topic(&pool, b).await.expect("beta");
    assert_eq!(beta.collection_status, CollectionStatus::Completed);
    assert!(beta.collection_errors.is_none());

    let alpha = get_shared_topic(&pool, a).await.expect("alpha");
    assert_eq!(alpha.posts_count, 0);
    assert_eq!(
        alpha.collection_status,
        CollectionStatus::Completed,
        "three sources answered, so one failure is partial"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn every_source_failing_marks_topic_failed(pool: sqlx::PgPool) {
    let id = create_topic(&pool, "rust language").await;

    let fetchers = baseline(&Behavior::Fail("feed unreachable"));
    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    let summary = collector.collect_all_shared_topics(false, &no_progress).await;

    assert_eq!(summary.total_posts, 0);
    assert_eq!(summary.errors.len(), 4);

    let row = get_shared_topic(&pool, id).await.expect("topic");
    assert_eq!(row.collection_status, CollectionStatus::Failed);
    assert!(row.last_collected.is_some(), "failed runs still start the cooldown");
    let errors = row.collection_errors.expect("errors recorded");
    assert!(errors.contains("feed unreachable"), "got: {errors}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn missing_fetcher_is_reported_once(pool: sqlx::PgPool) {
    create_topic(&pool, "alpha").await;
    create_topic(&pool, "beta").await;

    let mut fetchers = baseline(&Behavior::Posts(1));
    fetchers.retain(|f| f.source != Source::Youtube);

    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    let summary = collector.collect_all_shared_topics(false, &no_progress).await;

    let unavailable: Vec<&String> = summary
        .errors
        .iter()
        .filter(|e| e.contains("YouTube is unavailable"))
        .collect();
    assert_eq!(unavailable.len(), 1, "errors: {:?}", summary.errors);
    assert_eq!(summary.total_posts, 6);
    assert!(summary.sources_processed.contains(&Source::Youtube));
}

#[sqlx::test(migrations = "../../migrations")]
async fn hanging_fetcher_times_out_without_stalling_cycle(pool: sqlx::PgPool) {
    let id = create_topic(&pool, "rust language").await;

    let mut fetchers = baseline(&Behavior::Posts(1));
    fetchers.retain(|f| f.source != Source::Reddit);
    fetchers.push(Arc::new(FakeFetcher::new(Source::Reddit, Behavior::Hang)));

    let config = CollectorConfig {
        fetch_timeout: Duration::from_millis(100),
        ..CollectorConfig::default()
    };
    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), config);

    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        collector.collect_all_shared_topics(false, &no_progress),
    )
    .await
    .expect("cycle finishes despite a hanging fetcher");

    assert_eq!(summary.total_posts, 3);
    assert!(
        summary
            .errors
            .iter()
            .any(|e| e.starts_with("Reddit error") && e.contains("timed out")),
        "errors: {:?}",
        summary.errors
    );
    let row = get_shared_topic(&pool, id).await.expect("topic");
    assert_eq!(row.collection_status, CollectionStatus::Completed);
}

#[sqlx::test(migrations = "../../migrations")]
async fn panicking_fetcher_is_isolated(pool: sqlx::PgPool) {
    let id = create_topic(&pool, "rust language").await;

    let mut fetchers = baseline(&Behavior::Posts(1));
    fetchers.retain(|f| f.source != Source::News);
    fetchers.push(Arc::new(FakeFetcher::new(Source::News, Behavior::Panic)));

    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    let summary = collector.collect_all_shared_topics(false, &no_progress).await;

    assert_eq!(summary.total_posts, 3);
    assert!(
        summary.errors.iter().any(|e| e.contains("fetcher crashed")),
        "errors: {:?}",
        summary.errors
    );
    let row = get_shared_topic(&pool, id).await.expect("topic");
    assert_eq!(row.collection_status, CollectionStatus::Completed);
}

#[sqlx::test(migrations = "../../migrations")]
async fn live_claim_is_skipped(pool: sqlx::PgPool) {
    let id = create_topic(&pool, "rust language").await;
    topicwatch_db::begin_collection(&pool, id, Utc::now() - chrono::Duration::hours(2))
        .await
        .expect("claim");

    let fetchers = baseline(&Behavior::Posts(1));
    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    let summary = collector.collect_all_shared_topics(true, &no_progress).await;

    assert_eq!(summary.total_topics, 0);
    assert_eq!(summary.skipped_topics, 1);
    assert_eq!(total_calls(&fetchers), 0);
}

// ---------------------------------------------------------------------------
// On-demand collection
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn collect_one_respects_manual_cooldown(pool: sqlx::PgPool) {
    let id = create_topic(&pool, "rust language").await;

    let fetchers = baseline(&Behavior::Posts(1));
    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());

    let first = collector.collect_one_topic(id, false).await.expect("first");
    assert!(first.success);
    assert!(!first.skipped);
    assert_eq!(first.posts_collected, 4);
    assert_eq!(total_calls(&fetchers), 4);

    let second = collector.collect_one_topic(id, false).await.expect("second");
    assert!(second.skipped);
    let reason = second.skip_reason.expect("skip reason");
    assert!(reason.starts_with("collected recently"), "got: {reason}");
    assert!(reason.contains("30 minutes"), "got: {reason}");
    assert_eq!(total_calls(&fetchers), 4, "skipped run makes no fetch calls");

    let forced = collector.collect_one_topic(id, true).await.expect("forced");
    assert!(!forced.skipped);
    assert_eq!(total_calls(&fetchers), 8);
}

#[sqlx::test(migrations = "../../migrations")]
async fn collect_one_unknown_topic_is_not_found(pool: sqlx::PgPool) {
    let collector = SharedTopicCollector::new(pool, Vec::new(), test_config());
    let err = collector
        .collect_one_topic(999_999, false)
        .await
        .expect_err("unknown topic");
    assert!(matches!(err, CollectError::TopicNotFound(999_999)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn collect_one_reports_failure(pool: sqlx::PgPool) {
    let id = create_topic(&pool, "rust language").await;

    let collector = SharedTopicCollector::new(pool.clone(), Vec::new(), test_config());
    let outcome = collector.collect_one_topic(id, false).await.expect("runs");

    assert!(!outcome.success);
    assert_eq!(outcome.posts_collected, 0);
    assert_eq!(outcome.errors.len(), 4, "one per unavailable source");

    let row = get_shared_topic(&pool, id).await.expect("topic");
    assert_eq!(row.collection_status, CollectionStatus::Failed);
}

// ---------------------------------------------------------------------------
// Subscribe service
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn subscribe_flags_uncollected_topics(pool: sqlx::PgPool) {
    let user = create_guest_user(&pool).await.expect("guest");

    let first = subscribe(
        &pool,
        user.id,
        "  SpaceX Launches ",
        "falcon",
        "",
        &SubscriptionStyle::default(),
    )
    .await
    .expect("subscribe");
    assert_eq!(first.topic_name, "spacex launches");
    assert!(first.needs_collection);

    let fetchers = baseline(&Behavior::Posts(1));
    let collector = SharedTopicCollector::new(pool.clone(), as_dyn(&fetchers), test_config());
    collector
        .collect_one_topic(first.topic_id, false)
        .await
        .expect("collect");

    let again = subscribe(
        &pool,
        user.id,
        "spacex launches",
        "starship",
        "",
        &SubscriptionStyle::default(),
    )
    .await
    .expect("resubscribe");
    assert_eq!(again.topic_id, first.topic_id);
    assert_eq!(again.subscription_id, first.subscription_id);
    assert!(!again.needs_collection);
    assert_eq!(again.keywords, "falcon, starship");
}

#[sqlx::test(migrations = "../../migrations")]
async fn subscribe_rejects_blank_names(pool: sqlx::PgPool) {
    let user = create_guest_user(&pool).await.expect("guest");
    let err = subscribe(&pool, user.id, " !!! ", "", "", &SubscriptionStyle::default())
        .await
        .expect_err("blank name");
    assert!(matches!(err, topicwatch_db::DbError::InvalidTopicName(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn subscribe_for_unknown_user_leaves_no_topic(pool: sqlx::PgPool) {
    let err = subscribe(
        &pool,
        999_999,
        "Brand New Topic",
        "",
        "",
        &SubscriptionStyle::default(),
    )
    .await
    .expect_err("unknown user");
    assert!(matches!(err, DbError::Sqlx(_)), "got: {err:?}");

    let topic = find_exact_shared_topic(&pool, "brand new topic")
        .await
        .expect("lookup");
    assert!(topic.is_none(), "topic creation rolls back with the subscription");
}
