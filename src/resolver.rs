use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::schedule::{DoseOccurrence, PerDateSchedule, SlotBucket};
use crate::time::TimeSlot;

/// Shown in place of a clock time when there is no upcoming dose.
pub const NO_TIME: &str = "—";

pub const ALL_TAKEN: &str = "오늘 드실 약을 모두 드셨어요! 👍";
pub const NOTHING_SCHEDULED: &str = "오늘 복약 알림이 없습니다.";
pub const UNAVAILABLE: &str = "복약 알림을 불러오지 못했습니다.";

/// The "next reminder" line of the home view.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NextDose {
    pub time_text: String,
    pub description: String,
}

impl NextDose {
    fn placeholder(description: &str) -> Self {
        Self {
            time_text: NO_TIME.to_string(),
            description: description.to_string(),
        }
    }

    /// Fallback for when the schedule could not be read at all.
    pub fn unavailable() -> Self {
        Self::placeholder(UNAVAILABLE)
    }
}

/// Finds the first slot from the current window to the end of today that
/// still has an unchecked dose. Earlier slots are never revisited and the
/// scan never wraps to tomorrow.
pub fn resolve_next(now: NaiveTime, todays_buckets: &[SlotBucket]) -> NextDose {
    if todays_buckets.is_empty() {
        return NextDose::placeholder(NOTHING_SCHEDULED);
    }

    let window = TimeSlot::window_for(now);
    let pending = TimeSlot::ALL
        .into_iter()
        .filter(|slot| *slot >= window)
        .find_map(|slot| {
            let bucket = todays_buckets.iter().find(|b| b.time == slot)?;
            let unchecked: Vec<&DoseOccurrence> = bucket.unchecked().collect();
            (!unchecked.is_empty()).then_some((slot, unchecked))
        });

    match pending {
        Some((slot, unchecked)) => NextDose {
            time_text: slot.clock_text(),
            description: describe_pending(&unchecked),
        },
        None => NextDose::placeholder(ALL_TAKEN),
    }
}

/// [`resolve_next`] against the buckets of `now`'s date.
pub fn resolve_for(schedule: &PerDateSchedule, now: NaiveDateTime) -> NextDose {
    resolve_next(now.time(), schedule.buckets(now.date()))
}

/// "A 을/를 드셔야 해요." for one dose, "A 외 2개 드셔야 해요." for three.
pub fn describe_pending(unchecked: &[&DoseOccurrence]) -> String {
    match unchecked {
        [] => ALL_TAKEN.to_string(),
        [only] => format!("{} 을/를 드셔야 해요.", only.name),
        [first, rest @ ..] => format!("{} 외 {}개 드셔야 해요.", first.name, rest.len()),
    }
}
