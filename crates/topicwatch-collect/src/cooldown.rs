//! Due-ness predicate for topic collection.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// A topic collected less than `window` ago is not due unless forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    window: Duration,
}

impl CooldownPolicy {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn is_due(
        &self,
        last_collected: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        force: bool,
    ) -> bool {
        force || self.remaining(last_collected, now).is_none()
    }

    /// Time left until the topic is due, or `None` if it already is.
    ///
    /// A `last_collected` in the future counts as just collected.
    #[must_use]
    pub fn remaining(
        &self,
        last_collected: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let last = last_collected?;
        let window = TimeDelta::from_std(self.window).ok()?;
        let elapsed = (now - last).max(TimeDelta::zero());
        if elapsed >= window {
            return None;
        }
        (window - elapsed).to_std().ok()
    }
}
