//! Fixtures shared by the server's test modules.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use sqlx::PgPool;
use topicwatch_collect::{CollectorConfig, SharedTopicCollector};
use topicwatch_core::{AppConfig, Environment};

pub(crate) fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        fetch_timeout_secs: 5,
        fetch_user_agent: "topicwatch-test".to_string(),
        fetch_max_retries: 0,
        max_concurrent_sources: 3,
        manual_cooldown_mins: 30,
        scheduled_cooldown_mins: 55,
        guest_ttl_hours: 24,
        digest_lookback_days: 3,
        digest_send_delay_ms: 0,
        collect_interval_mins: 60,
        guest_cleanup_interval_hours: 6,
        orphan_cleanup_interval_hours: 24,
        digest_interval_hours: 24,
        brevo: None,
    }
}

/// A collector with no fetchers: every planned source reports unavailable.
pub(crate) fn offline_collector(pool: PgPool) -> Arc<SharedTopicCollector> {
    Arc::new(SharedTopicCollector::new(
        pool,
        Vec::new(),
        CollectorConfig::default(),
    ))
}
