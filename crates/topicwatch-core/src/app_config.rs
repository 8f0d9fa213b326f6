use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Brevo transactional email settings. Present only when `BREVO_API` is set.
#[derive(Clone)]
pub struct BrevoConfig {
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
}

impl std::fmt::Debug for BrevoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrevoConfig")
            .field("api_key", &"[redacted]")
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub fetch_max_retries: u32,
    pub max_concurrent_sources: usize,
    pub manual_cooldown_mins: u64,
    pub scheduled_cooldown_mins: u64,
    pub guest_ttl_hours: u64,
    pub digest_lookback_days: u32,
    pub digest_send_delay_ms: u64,
    pub collect_interval_mins: u64,
    pub guest_cleanup_interval_hours: u64,
    pub orphan_cleanup_interval_hours: u64,
    pub digest_interval_hours: u64,
    pub brevo: Option<BrevoConfig>,
}

impl AppConfig {
    #[must_use]
    pub fn manual_cooldown(&self) -> Duration {
        Duration::from_secs(self.manual_cooldown_mins * 60)
    }

    #[must_use]
    pub fn scheduled_cooldown(&self) -> Duration {
        Duration::from_secs(self.scheduled_cooldown_mins * 60)
    }

    #[must_use]
    pub fn guest_ttl(&self) -> Duration {
        Duration::from_secs(self.guest_ttl_hours * 3600)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("max_concurrent_sources", &self.max_concurrent_sources)
            .field("manual_cooldown_mins", &self.manual_cooldown_mins)
            .field("scheduled_cooldown_mins", &self.scheduled_cooldown_mins)
            .field("guest_ttl_hours", &self.guest_ttl_hours)
            .field("digest_lookback_days", &self.digest_lookback_days)
            .field("digest_send_delay_ms", &self.digest_send_delay_ms)
            .field("collect_interval_mins", &self.collect_interval_mins)
            .field(
                "guest_cleanup_interval_hours",
                &self.guest_cleanup_interval_hours,
            )
            .field(
                "orphan_cleanup_interval_hours",
                &self.orphan_cleanup_interval_hours,
            )
            .field("digest_interval_hours", &self.digest_interval_hours)
            .field("brevo", &self.brevo)
            .finish()
    }
}
