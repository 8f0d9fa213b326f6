//! In-memory job table driven by the dispatcher loop.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fire `interval` after the previous run finished.
    Every(Duration),
}

impl Trigger {
    #[must_use]
    pub fn interval(self) -> Duration {
        match self {
            Trigger::Every(interval) => interval,
        }
    }

    /// Stored form of the trigger. When it changes, the persisted
    /// `next_run` is discarded.
    #[must_use]
    pub fn spec(self) -> String {
        match self {
            Trigger::Every(interval) => format!("every {}s", interval.as_secs()),
        }
    }

    fn next_after(self, at: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.interval())
            .ok()
            .and_then(|delta| at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone)]
pub struct JobEntry {
    pub job_id: &'static str,
    pub trigger: Trigger,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub running: bool,
}

#[derive(Debug, Default)]
pub struct JobTable {
    entries: Vec<JobEntry>,
}

impl JobTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job first due one interval after `now`, replacing any entry
    /// with the same id.
    pub fn register(&mut self, job_id: &'static str, trigger: Trigger, now: DateTime<Utc>) {
        self.entries.retain(|e| e.job_id != job_id);
        self.entries.push(JobEntry {
            job_id,
            trigger,
            last_run: None,
            next_run: trigger.next_after(now),
            running: false,
        });
    }

    /// Overrides `next_run` with a persisted value. Unknown ids are ignored.
    pub fn restore(
        &mut self,
        job_id: &str,
        last_run: Option<DateTime<Utc>>,
        next_run: DateTime<Utc>,
    ) {
        if let Some(entry) = self.entry_mut(job_id) {
            entry.last_run = last_run;
            entry.next_run = next_run;
        }
    }

    /// Jobs whose `next_run` has passed and that are not already running.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| !e.running && e.next_run <= now)
            .map(|e| e.job_id)
            .collect()
    }

    /// Returns `false` if the job is unknown or still running.
    pub fn mark_started(&mut self, job_id: &str, now: DateTime<Utc>) -> bool {
        match self.entry_mut(job_id) {
            Some(entry) if !entry.running => {
                entry.running = true;
                entry.last_run = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Clears the running flag and schedules the next run one interval
    /// after `finished_at`. Returns that time, or `None` for an unknown id.
    pub fn mark_finished(
        &mut self,
        job_id: &str,
        finished_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let entry = self.entry_mut(job_id)?;
        entry.running = false;
        entry.next_run = entry.trigger.next_after(finished_at);
        Some(entry.next_run)
    }

    #[must_use]
    pub fn get(&self, job_id: &str) -> Option<&JobEntry> {
        self.entries.iter().find(|e| e.job_id == job_id)
    }

    fn entry_mut(&mut self, job_id: &str) -> Option<&mut JobEntry> {
        self.entries.iter_mut().find(|e| e.job_id == job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn table(now: DateTime<Utc>) -> JobTable {
        let mut table = JobTable::new();
        table.register("collect", Trigger::Every(HOUR), now);
        table.register("sweep", Trigger::Every(HOUR * 6), now);
        table
    }

    #[test]
    fn nothing_is_due_right_after_registration() {
        let now = Utc::now();
        let table = table(now);
        assert!(table.due(now).is_empty());
        assert_eq!(table.due(now + TimeDelta::hours(1)), vec!["collect"]);
        assert_eq!(
            table.due(now + TimeDelta::hours(6)),
            vec!["collect", "sweep"]
        );
    }

    #[test]
    fn running_job_is_never_due_twice() {
        let now = Utc::now();
        let mut table = table(now);
        let later = now + TimeDelta::hours(2);

        assert!(table.mark_started("collect", later));
        assert!(!table.mark_started("collect", later), "no overlapping run");
        assert!(table.due(later + TimeDelta::hours(5)).iter().all(|id| *id != "collect"));
    }

    #[test]
    fn next_run_counts_from_finish() {
        let now = Utc::now();
        let mut table = table(now);
        let start = now + TimeDelta::hours(1);
        let finish = start + TimeDelta::minutes(20);

        table.mark_started("collect", start);
        let next = table.mark_finished("collect", finish).expect("known job");

        assert_eq!(next, finish + TimeDelta::hours(1));
        let entry = table.get("collect").expect("entry");
        assert!(!entry.running);
        assert_eq!(entry.last_run, Some(start));
    }

    #[test]
    fn restore_overrides_next_run() {
        let now = Utc::now();
        let mut table = table(now);
        let overdue = now - TimeDelta::minutes(5);

        table.restore("sweep", None, overdue);
        table.restore("unknown", None, overdue);

        assert_eq!(table.due(now), vec!["sweep"]);
        assert!(table.get("unknown").is_none());
    }

    #[test]
    fn re_registering_replaces_entry() {
        let now = Utc::now();
        let mut table = table(now);
        table.register("collect", Trigger::Every(HOUR * 2), now);

        assert!(table.due(now + TimeDelta::hours(1)).is_empty());
        assert_eq!(
            table.due(now + TimeDelta::hours(6)),
            vec!["sweep", "collect"]
        );
        let entry = table.get("collect").expect("entry");
        assert_eq!(entry.trigger, Trigger::Every(HOUR * 2));
    }

    #[test]
    fn unknown_jobs_are_rejected() {
        let mut table = JobTable::new();
        assert!(!table.mark_started("ghost", Utc::now()));
        assert!(table.mark_finished("ghost", Utc::now()).is_none());
    }

    #[test]
    fn trigger_spec_names_the_interval() {
        assert_eq!(Trigger::Every(HOUR).spec(), "every 3600s");
    }
}
