//! End-to-end: a job's next-fire time survives a process restart (reopening
//! the store at the same path).

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use cron::Schedule;
use scheduler::Scheduler;

#[test]
fn next_execution_is_consistent_across_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedules");
    let daily = Schedule::from_str("0 0 0 * * *").unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();

    let first_next = {
        let mut scheduler = Scheduler::open(&path).unwrap();
        let next = scheduler.get_next_execution("billing/root.log", &daily, t0).unwrap();
        scheduler.record_execution("billing/root.log", next).unwrap();
        next
    };
    assert_eq!(first_next, Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap());

    // Simulate a restart: reopen the store fresh from disk.
    let mut scheduler = Scheduler::open(&path).unwrap();
    assert_eq!(
        scheduler.get_last_execution("billing/root.log").unwrap(),
        Some(first_next)
    );

    let second_next = scheduler
        .get_next_execution("billing/root.log", &daily, first_next)
        .unwrap();
    assert_eq!(second_next, Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap());
}
