#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `scheduler` tracks when cron-scheduled jobs (facility rotations) last
//! ran, and computes when each is next due. A job is identified by a
//! durable `job_id` -- in this daemon, the target log file's path -- so
//! state survives process restarts.
//!
//! # Design
//!
//! [`Scheduler`] wraps a [`store::Store`], a JSON-on-disk map written with a
//! temp-file-then-rename sequence so a crash mid-write never corrupts it.
//! An unseen `job_id` is lazily initialized to the caller-supplied `now` the
//! first time it is queried, matching the reference scheduler's
//! first-write-on-first-read behavior.
//!
//! # Invariants
//!
//! - [`Scheduler::get_next_execution`] never panics on an unseen `job_id`;
//!   it seeds the store and proceeds.
//! - A [`cron::Schedule`] always has a next fire time after any instant, so
//!   `get_next_execution` always returns `Some`-equivalent: `unwrap` on the
//!   schedule iterator is safe by construction of the `cron` crate.
//!
//! # Errors
//!
//! [`SchedulerError`] wraps the underlying [`store::StoreError`] for
//! on-disk read/write failures.

pub mod store;

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use cron::Schedule;

pub use store::StoreError;

/// Errors scheduling or recording job executions.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tracks last-execution times for cron-scheduled jobs and computes the next
/// fire time for each.
pub struct Scheduler {
    store: store::Store,
}

impl Scheduler {
    /// Opens the durable store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Scheduler, SchedulerError> {
        Ok(Scheduler {
            store: store::Store::open(db_path.as_ref())?,
        })
    }

    /// Returns the next time `job_id` should run under `schedule`, seeding
    /// the store with `now` if the job has never been seen before.
    pub fn get_next_execution(
        &mut self,
        job_id: &str,
        schedule: &Schedule,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        if self.store.get(job_id).is_none() {
            self.store.set(job_id, now.timestamp())?;
        }

        let last_executed = self.get_last_execution(job_id)?.expect("just seeded above");
        Ok(schedule
            .after(&last_executed)
            .next()
            .expect("a cron::Schedule always has a next occurrence after any instant"))
    }

    /// Returns the last time `job_id` ran, or `None` if it has never been
    /// recorded.
    pub fn get_last_execution(&self, job_id: &str) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        Ok(self.store.get(job_id).map(|secs| {
            Utc.timestamp_opt(secs, 0)
                .single()
                .expect("stored timestamps are always in range")
        }))
    }

    /// Records that `job_id` ran at `now`.
    pub fn record_execution(&mut self, job_id: &str, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.store.set(job_id, now.timestamp())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn hourly() -> Schedule {
        Schedule::from_str("0 0 * * * *").unwrap()
    }

    #[test]
    fn unseen_job_is_seeded_at_now() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = Scheduler::open(dir.path().join("schedules")).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap();

        let next = scheduler.get_next_execution("job-a", &hourly(), now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
        assert_eq!(scheduler.get_last_execution("job-a").unwrap(), Some(now));
    }

    #[test]
    fn record_execution_advances_next_fire() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = Scheduler::open(dir.path().join("schedules")).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();

        scheduler.get_next_execution("job-a", &hourly(), t0).unwrap();
        scheduler.record_execution("job-a", t1).unwrap();

        let next = scheduler.get_next_execution("job-a", &hourly(), t1).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules");
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap();

        {
            let mut scheduler = Scheduler::open(&path).unwrap();
            scheduler.record_execution("job-a", t0).unwrap();
        }

        let scheduler = Scheduler::open(&path).unwrap();
        assert_eq!(scheduler.get_last_execution("job-a").unwrap(), Some(t0));
    }
}
