use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use log::{info, warn};
use notify_rust::Notification;

use crate::database::ScheduleStore;
use crate::resolver::describe_pending;
use crate::schedule::{DoseOccurrence, SlotBucket};
use crate::time::TimeSlot;

/// Buckets whose slot time has passed, that still have unchecked doses, and
/// that have not been announced yet today.
fn due_buckets<'a>(
    buckets: &'a [SlotBucket],
    now: NaiveTime,
    notified: &HashSet<TimeSlot>,
) -> Vec<&'a SlotBucket> {
    buckets
        .iter()
        .filter(|b| b.time.starts_at() <= now)
        .filter(|b| b.has_pending())
        .filter(|b| !notified.contains(&b.time))
        .collect()
}

fn notification_body(bucket: &SlotBucket) -> String {
    let unchecked: Vec<&DoseOccurrence> = bucket.unchecked().collect();
    format!(
        "{} {}\n{}",
        bucket.time,
        bucket.label,
        describe_pending(&unchecked)
    )
}

pub fn run_daemon(store: &impl ScheduleStore) {
    println!("Daemon started. Checking for dose reminders...");
    println!("Press Ctrl+C to stop.");

    // Slots already announced today
    let mut notified: HashSet<TimeSlot> = HashSet::new();
    let mut current_day = Local::now().date_naive();

    loop {
        let now = Local::now().naive_local();

        if now.date() != current_day {
            notified.clear();
            current_day = now.date();
            info!("new day {}: reminders reset", current_day);
        }

        match store.read_schedule() {
            Ok(schedule) => {
                for bucket in due_buckets(schedule.buckets(current_day), now.time(), &notified) {
                    let result = Notification::new()
                        .summary("복약 알림")
                        .body(&notification_body(bucket))
                        .icon("medication")
                        .timeout(0) // Don't auto-dismiss
                        .show();

                    match result {
                        Ok(_) => {
                            notified.insert(bucket.time);
                            info!("reminder sent for {} on {}", bucket.time, current_day);
                        }
                        Err(e) => warn!("failed to send notification for {}: {}", bucket.time, e),
                    }
                }
            }
            Err(e) => warn!("could not load schedule, retrying next tick: {}", e),
        }

        thread::sleep(Duration::from_secs(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::MedicationEntry;
    use crate::schedule::PerDateSchedule;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 9).unwrap()
    }

    fn schedule() -> PerDateSchedule {
        let mut schedule = PerDateSchedule::new();
        schedule
            .expand(&MedicationEntry::new("타이레놀", 3, 1, day()).unwrap())
            .unwrap();
        schedule
            .expand(&MedicationEntry::new("혈압약", 1, 1, day()).unwrap())
            .unwrap();
        schedule
    }

    fn times(buckets: &[&SlotBucket]) -> Vec<TimeSlot> {
        buckets.iter().map(|b| b.time).collect()
    }

    #[test]
    fn test_nothing_due_before_first_slot() {
        let schedule = schedule();
        assert!(due_buckets(schedule.buckets(day()), at(7, 59), &HashSet::new()).is_empty());
    }

    #[test]
    fn test_past_slots_are_due_until_notified() {
        let schedule = schedule();
        let buckets = schedule.buckets(day());
        assert_eq!(
            times(&due_buckets(buckets, at(12, 0), &HashSet::new())),
            vec![TimeSlot::Morning, TimeSlot::Midday]
        );

        let notified = HashSet::from([TimeSlot::Morning]);
        assert_eq!(
            times(&due_buckets(buckets, at(12, 0), &notified)),
            vec![TimeSlot::Midday]
        );
    }

    #[test]
    fn test_checked_slots_are_not_due() {
        let mut schedule = schedule();
        schedule.set_all_checked(day(), Some(TimeSlot::Morning));
        assert_eq!(
            times(&due_buckets(schedule.buckets(day()), at(9, 0), &HashSet::new())),
            Vec::<TimeSlot>::new()
        );
    }

    #[test]
    fn test_notification_body() {
        let schedule = schedule();
        let morning = &schedule.buckets(day())[0];
        assert_eq!(
            notification_body(morning),
            "08:00 아침\n타이레놀 외 1개 드셔야 해요."
        );
    }
}
