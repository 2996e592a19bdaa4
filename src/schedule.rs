use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::medication::{MedicationEntry, MedicationKey, ValidationError};
use crate::time::TimeSlot;

/// One dose of one medication at one (date, slot).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DoseOccurrence {
    pub id: String,
    pub name: String,
    pub checked: bool,
    /// Times per day of the originating entry.
    #[serde(with = "decimal_string")]
    pub frequency: u8,
    /// Duration in days of the originating entry.
    #[serde(with = "decimal_string")]
    pub days: u32,
    #[serde(with = "slash_date")]
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<Uuid>,
}

impl DoseOccurrence {
    fn new(entry: &MedicationEntry) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: entry.name.clone(),
            checked: false,
            frequency: entry.times_per_day,
            days: entry.duration_days,
            start_date: entry.start_date,
            entry_id: entry.id,
        }
    }

    pub fn key(&self) -> MedicationKey<'_> {
        MedicationKey {
            name: &self.name,
            start_date: self.start_date,
            times_per_day: self.frequency,
            duration_days: self.days,
        }
    }

    /// Whether this occurrence was expanded from `entry`. Ids decide when
    /// both sides carry one; otherwise the full tuple has to match.
    pub fn belongs_to(&self, entry: &MedicationEntry) -> bool {
        match (self.entry_id, entry.id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => self.key() == entry.key(),
        }
    }
}

/// All doses due at one slot of one day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SlotBucket {
    pub time: TimeSlot,
    pub label: String,
    pub medications: Vec<DoseOccurrence>,
}

impl SlotBucket {
    pub fn new(time: TimeSlot) -> Self {
        Self {
            time,
            label: time.label().to_string(),
            medications: Vec::new(),
        }
    }

    pub fn unchecked(&self) -> impl Iterator<Item = &DoseOccurrence> {
        self.medications.iter().filter(|occ| !occ.checked)
    }

    pub fn has_pending(&self) -> bool {
        self.unchecked().next().is_some()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid medication entry: {0}")]
    Validation(#[from] ValidationError),
    #[error("no dose of '{name}' is scheduled at {slot} on {date}")]
    NotScheduled {
        name: String,
        date: NaiveDate,
        slot: TimeSlot,
    },
}

/// Every materialized dose, grouped by date and then by slot.
///
/// Invariants kept by every mutation here:
/// - buckets of a date are sorted by slot order and hold at most one bucket
///   per slot
/// - no date maps to an empty bucket list, and no bucket is left empty
///   after a purge
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PerDateSchedule {
    days: BTreeMap<NaiveDate, Vec<SlotBucket>>,
}

impl PerDateSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Buckets for `date`, empty when nothing is scheduled.
    pub fn buckets(&self, date: NaiveDate) -> &[SlotBucket] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn occurrences(&self) -> impl Iterator<Item = (NaiveDate, TimeSlot, &DoseOccurrence)> {
        self.days.iter().flat_map(|(date, buckets)| {
            buckets.iter().flat_map(move |bucket| {
                bucket
                    .medications
                    .iter()
                    .map(move |occ| (*date, bucket.time, occ))
            })
        })
    }

    /// Materializes one occurrence per (date, slot) of `entry`'s course,
    /// skipping any the entry already has. Returns how many were created.
    pub fn expand(&mut self, entry: &MedicationEntry) -> Result<usize, ScheduleError> {
        entry.validate()?;

        let mut created = 0;
        for date in entry.dates() {
            let buckets = self.days.entry(date).or_default();
            for &slot in entry.slots() {
                let index = match buckets.iter().position(|b| b.time == slot) {
                    Some(index) => index,
                    None => {
                        buckets.push(SlotBucket::new(slot));
                        buckets.len() - 1
                    }
                };
                let bucket = &mut buckets[index];
                if bucket.medications.iter().any(|occ| occ.belongs_to(entry)) {
                    continue;
                }
                bucket.medications.push(DoseOccurrence::new(entry));
                created += 1;
            }
            buckets.sort_by_key(|b| b.time);
        }

        debug!(
            "expanded '{}' from {}: {} new dose(s)",
            entry.name, entry.start_date, created
        );
        Ok(created)
    }

    /// Removes every occurrence `entry` created across its course, dropping
    /// buckets and dates left empty. Returns how many were removed.
    pub fn purge(&mut self, entry: &MedicationEntry) -> usize {
        let mut removed = 0;
        for date in entry.dates() {
            let Some(buckets) = self.days.get_mut(&date) else {
                continue;
            };
            for bucket in buckets.iter_mut() {
                let before = bucket.medications.len();
                bucket.medications.retain(|occ| !occ.belongs_to(entry));
                removed += before - bucket.medications.len();
            }
            buckets.retain(|b| !b.medications.is_empty());
            if buckets.is_empty() {
                self.days.remove(&date);
            }
        }
        removed
    }

    /// Deletes a medication's doses from the schedule.
    pub fn delete(&mut self, entry: &MedicationEntry) -> usize {
        let removed = self.purge(entry);
        debug!("deleted '{}': {} dose(s) removed", entry.name, removed);
        removed
    }

    /// Replaces everything `old` created with a fresh expansion of `new`.
    /// The new entry is validated before anything is purged, so a rejected
    /// edit leaves the schedule untouched.
    pub fn edit(
        &mut self,
        old: &MedicationEntry,
        new: &MedicationEntry,
    ) -> Result<usize, ScheduleError> {
        new.validate()?;
        let removed = self.purge(old);
        debug!("edit of '{}' purged {} dose(s)", old.name, removed);
        self.expand(new)
    }

    /// Sets `checked` on every dose named `name` (case-insensitive) at
    /// `slot` on `date`.
    pub fn set_checked(
        &mut self,
        date: NaiveDate,
        slot: TimeSlot,
        name: &str,
        checked: bool,
    ) -> Result<usize, ScheduleError> {
        let name_lower = name.trim().to_lowercase();
        let mut matching = 0;
        if let Some(bucket) = self
            .days
            .get_mut(&date)
            .and_then(|buckets| buckets.iter_mut().find(|b| b.time == slot))
        {
            for occ in bucket.medications.iter_mut() {
                if occ.name.to_lowercase() == name_lower {
                    occ.checked = checked;
                    matching += 1;
                }
            }
        }

        if matching == 0 {
            return Err(ScheduleError::NotScheduled {
                name: name.trim().to_string(),
                date,
                slot,
            });
        }
        Ok(matching)
    }

    /// Marks every dose of `date` (or of one slot of it) as taken.
    /// Returns how many changed state.
    pub fn set_all_checked(&mut self, date: NaiveDate, slot: Option<TimeSlot>) -> usize {
        let Some(buckets) = self.days.get_mut(&date) else {
            return 0;
        };
        let mut changed = 0;
        for bucket in buckets.iter_mut() {
            if slot.is_some_and(|s| s != bucket.time) {
                continue;
            }
            for occ in bucket.medications.iter_mut().filter(|occ| !occ.checked) {
                occ.checked = true;
                changed += 1;
            }
        }
        changed
    }
}

/// Integers persisted as decimal strings (`"3"`).
mod decimal_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(de::Error::custom)
    }
}

/// Dates persisted as `YYYY/MM/DD`.
mod slash_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y/%m/%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(raw.trim(), FORMAT).map_err(de::Error::custom)
    }
}
