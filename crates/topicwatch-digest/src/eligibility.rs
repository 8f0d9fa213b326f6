//! Who gets a digest, and when.

use chrono::{DateTime, TimeDelta, Utc};
use topicwatch_core::DigestFrequency;
use topicwatch_db::UserRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestDecision {
    Send,
    Skip(String),
}

/// When the next digest is due; `None` means never sent, so due now.
#[must_use]
pub fn next_digest_date(
    last_sent: Option<DateTime<Utc>>,
    frequency: DigestFrequency,
) -> Option<DateTime<Utc>> {
    let last = last_sent?;
    let next = TimeDelta::from_std(frequency.interval())
        .ok()
        .and_then(|interval| last.checked_add_signed(interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    Some(next)
}

/// Registered users with digests enabled and an email on file.
#[must_use]
pub fn is_eligible(user: &UserRow) -> bool {
    user.digest_enabled && !user.is_guest && user.email.as_deref().is_some_and(|e| !e.is_empty())
}

/// Frequency check for an eligible user. `force` skips it entirely.
#[must_use]
pub fn evaluate(user: &UserRow, now: DateTime<Utc>, force: bool) -> DigestDecision {
    if force {
        return DigestDecision::Send;
    }

    let frequency = user.frequency();
    match next_digest_date(user.last_digest_sent, frequency) {
        Some(next) if now < next => {
            let days_left = (next - now).num_days();
            DigestDecision::Skip(format!("next digest in {days_left} days ({frequency})"))
        }
        _ => DigestDecision::Send,
    }
}
