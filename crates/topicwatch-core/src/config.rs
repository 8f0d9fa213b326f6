use crate::app_config::{AppConfig, BrevoConfig, Environment};
use crate::ConfigError;

const DEFAULT_BREVO_FROM: &str = "noreply@topicwatch.local";
const DEFAULT_BREVO_FROM_NAME: &str = "Topic Monitor";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_positive_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let value = parse_u64(var, default)?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        let value = raw
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("TOPICWATCH_ENV", "development"))?;

    let bind_addr = parse_addr("TOPICWATCH_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("TOPICWATCH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("TOPICWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TOPICWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TOPICWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let fetch_timeout_secs = parse_positive_u64("TOPICWATCH_FETCH_TIMEOUT_SECS", "45")?;
    let fetch_user_agent = or_default(
        "TOPICWATCH_FETCH_USER_AGENT",
        "topicwatch/0.1 (+topic-monitoring)",
    );
    let fetch_max_retries = parse_u32("TOPICWATCH_FETCH_MAX_RETRIES", "2")?;
    let max_concurrent_sources = parse_usize("TOPICWATCH_MAX_CONCURRENT_SOURCES", "3")?;

    let manual_cooldown_mins = parse_u64("TOPICWATCH_MANUAL_COOLDOWN_MINS", "30")?;
    let scheduled_cooldown_mins = parse_u64("TOPICWATCH_SCHEDULED_COOLDOWN_MINS", "55")?;
    let guest_ttl_hours = parse_positive_u64("TOPICWATCH_GUEST_TTL_HOURS", "24")?;

    let digest_lookback_days = parse_u32("TOPICWATCH_DIGEST_LOOKBACK_DAYS", "3")?;
    let digest_send_delay_ms = parse_u64("TOPICWATCH_DIGEST_SEND_DELAY_MS", "2000")?;

    let collect_interval_mins = parse_positive_u64("TOPICWATCH_COLLECT_INTERVAL_MINS", "60")?;
    let guest_cleanup_interval_hours =
        parse_positive_u64("TOPICWATCH_GUEST_CLEANUP_INTERVAL_HOURS", "6")?;
    let orphan_cleanup_interval_hours =
        parse_positive_u64("TOPICWATCH_ORPHAN_CLEANUP_INTERVAL_HOURS", "24")?;
    let digest_interval_hours = parse_positive_u64("TOPICWATCH_DIGEST_INTERVAL_HOURS", "24")?;

    let brevo = lookup("BREVO_API")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(|api_key| BrevoConfig {
            api_key,
            from_email: or_default("BREVO_FROM", DEFAULT_BREVO_FROM),
            from_name: or_default("BREVO_FROM_NAME", DEFAULT_BREVO_FROM_NAME),
        });

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        fetch_timeout_secs,
        fetch_user_agent,
        fetch_max_retries,
        max_concurrent_sources,
        manual_cooldown_mins,
        scheduled_cooldown_mins,
        guest_ttl_hours,
        digest_lookback_days,
        digest_send_delay_ms,
        collect_interval_mins,
        guest_cleanup_interval_hours,
        orphan_cleanup_interval_hours,
        digest_interval_hours,
        brevo,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TOPICWATCH_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
