//! One pass over every digest candidate.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use sqlx::PgPool;
use topicwatch_core::AppConfig;
use topicwatch_db::UserRow;

use crate::compose::compose_digest;
use crate::eligibility::{evaluate, is_eligible, DigestDecision};
use crate::error::DigestError;
use crate::sender::EmailSender;

const MAX_DIGEST_POSTS: i64 = 25;

#[derive(Debug, Clone)]
pub struct DigestOptions {
    /// Ignore each user's frequency and send anyway.
    pub force: bool,
    /// Restrict the run to these users (still subject to eligibility).
    pub specific_user_ids: Option<Vec<i64>>,
    /// Leave `last_digest_sent` untouched, optionally redirecting every
    /// message to `test_email`.
    pub test_mode: bool,
    pub test_email: Option<String>,
    pub lookback_days: u32,
    /// Pause between consecutive sends.
    pub send_delay: Duration,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            force: false,
            specific_user_ids: None,
            test_mode: false,
            test_email: None,
            lookback_days: 3,
            send_delay: Duration::from_secs(2),
        }
    }
}

impl DigestOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            lookback_days: config.digest_lookback_days,
            send_delay: Duration::from_millis(config.digest_send_delay_ms),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUser {
    pub user_id: i64,
    pub email: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DigestReport {
    /// Candidates that passed the eligibility filter.
    pub eligible: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub skipped: Vec<SkippedUser>,
    pub errors: Vec<String>,
}

impl DigestReport {
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.success_count + self.error_count
    }

    /// More than half of the attempted sends failed.
    #[must_use]
    pub fn exceeds_failure_threshold(&self) -> bool {
        self.attempts() > 0 && self.error_count > self.success_count
    }
}

/// Sends a digest to every eligible, due user.
///
/// Per-user failures are counted in the report and never stop the run.
///
/// # Errors
///
/// Returns [`DigestError::Db`] only if the candidate list cannot be loaded.
pub async fn run_digest_cycle(
    pool: &PgPool,
    sender: &dyn EmailSender,
    options: &DigestOptions,
) -> Result<DigestReport, DigestError> {
    let candidates =
        topicwatch_db::list_digest_candidates(pool, options.specific_user_ids.as_deref()).await?;

    let mut report = DigestReport::default();
    let now = Utc::now();
    let mut due = Vec::new();
    for user in candidates.into_iter().filter(is_eligible) {
        report.eligible += 1;
        match evaluate(&user, now, options.force) {
            DigestDecision::Send => due.push(user),
            DigestDecision::Skip(reason) => report.skipped.push(SkippedUser {
                user_id: user.id,
                email: user.email.clone(),
                reason,
            }),
        }
    }

    tracing::info!(
        eligible = report.eligible,
        due = due.len(),
        skipped = report.skipped.len(),
        test_mode = options.test_mode,
        "digest: starting cycle"
    );

    let total = due.len();
    for (index, user) in due.iter().enumerate() {
        match send_one(pool, sender, user, options).await {
            Ok(()) => report.success_count += 1,
            Err(e) => {
                tracing::warn!(user_id = user.id, error = %e, "digest: send failed");
                report.error_count += 1;
                report.errors.push(format!("user {}: {e}", user.id));
            }
        }

        if index + 1 < total && !options.send_delay.is_zero() {
            tokio::time::sleep(options.send_delay).await;
        }
    }

    tracing::info!(
        sent = report.success_count,
        failed = report.error_count,
        skipped = report.skipped.len(),
        "digest: cycle complete"
    );

    Ok(report)
}

async fn send_one(
    pool: &PgPool,
    sender: &dyn EmailSender,
    user: &UserRow,
    options: &DigestOptions,
) -> Result<(), DigestError> {
    let Some(email) = user.email.as_deref() else {
        return Ok(());
    };
    let recipient = match (&options.test_email, options.test_mode) {
        (Some(test_email), true) => test_email.as_str(),
        _ => email,
    };

    let since = Utc::now() - TimeDelta::days(i64::from(options.lookback_days));
    let posts =
        topicwatch_db::list_recent_posts_for_user(pool, user.id, since, MAX_DIGEST_POSTS).await?;
    let digest = compose_digest(&posts, options.lookback_days);

    sender.send(recipient, &digest.subject, &digest.html).await?;
    tracing::info!(
        user_id = user.id,
        posts = posts.len(),
        redirected = recipient != email,
        "digest: sent"
    );

    if !options.test_mode {
        topicwatch_db::mark_digest_sent(pool, user.id, Utc::now()).await?;
    }
    Ok(())
}

/// Lenient comma-separated id list; non-numeric entries are dropped.
#[must_use]
pub fn parse_user_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_ids_skips_garbage() {
        assert_eq!(parse_user_ids("1, 2,x, ,3"), vec![1, 2, 3]);
        assert_eq!(parse_user_ids("-4,0,5"), vec![5]);
        assert!(parse_user_ids("").is_empty());
    }

    #[test]
    fn failure_threshold_is_strict_majority() {
        let mut report = DigestReport::default();
        assert!(!report.exceeds_failure_threshold());

        report.success_count = 2;
        report.error_count = 2;
        assert!(!report.exceeds_failure_threshold());

        report.error_count = 3;
        assert!(report.exceeds_failure_threshold());
        assert_eq!(report.attempts(), 5);
    }

    #[test]
    fn options_follow_app_config_defaults() {
        let options = DigestOptions::default();
        assert_eq!(options.lookback_days, 3);
        assert_eq!(options.send_delay, Duration::from_secs(2));
        assert!(!options.force && !options.test_mode);
    }
}
