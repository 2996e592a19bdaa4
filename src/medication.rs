use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::TimeSlot;

/// Longest course accepted, about ten years.
pub const MAX_DURATION_DAYS: u32 = 3650;

/// A course of medication as entered by the user: what, how many times a
/// day, for how many days, starting when.
///
/// Entries are the source every dose occurrence in the schedule is expanded
/// from. They are kept in the medication registry so an edit or delete can
/// find the occurrences the previous version created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationEntry {
    /// Stable identity copied onto every derived occurrence. Entries written
    /// before ids existed have none and are matched by their tuple instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    pub times_per_day: u8,
    pub duration_days: u32,
    pub start_date: NaiveDate,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("medication name cannot be empty")]
    EmptyName,
    #[error("times per day must be between 1 and 4, got {0}")]
    TimesPerDay(u8),
    #[error("duration must be at least one day")]
    ZeroDuration,
    #[error("a course can last at most {max} days, got {0}", max = MAX_DURATION_DAYS)]
    TooLong(u32),
    #[error("a {days}-day course starting {start} runs past the last representable date")]
    OutOfRange { start: NaiveDate, days: u32 },
}

/// The `(name, startDate, timesPerDay, durationDays)` tuple that identifies
/// which entry an occurrence came from when no entry id is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedicationKey<'a> {
    pub name: &'a str,
    pub start_date: NaiveDate,
    pub times_per_day: u8,
    pub duration_days: u32,
}

impl MedicationEntry {
    /// Builds and validates a new entry with a freshly generated id.
    pub fn new(
        name: impl Into<String>,
        times_per_day: u8,
        duration_days: u32,
        start_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let entry = Self {
            id: Some(Uuid::new_v4()),
            name: name.into().trim().to_string(),
            times_per_day,
            duration_days,
            start_date,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if TimeSlot::for_times_per_day(self.times_per_day).is_none() {
            return Err(ValidationError::TimesPerDay(self.times_per_day));
        }
        if self.duration_days == 0 {
            return Err(ValidationError::ZeroDuration);
        }
        if self.duration_days > MAX_DURATION_DAYS {
            return Err(ValidationError::TooLong(self.duration_days));
        }
        if self.end_date().is_none() {
            return Err(ValidationError::OutOfRange {
                start: self.start_date,
                days: self.duration_days,
            });
        }
        Ok(())
    }

    pub fn key(&self) -> MedicationKey<'_> {
        MedicationKey {
            name: &self.name,
            start_date: self.start_date,
            times_per_day: self.times_per_day,
            duration_days: self.duration_days,
        }
    }

    /// Slots this entry is taken at each day. Empty for an invalid count.
    pub fn slots(&self) -> &'static [TimeSlot] {
        TimeSlot::for_times_per_day(self.times_per_day).unwrap_or(&[])
    }

    /// Last day of the course, inclusive.
    pub fn end_date(&self) -> Option<NaiveDate> {
        let last = self.duration_days.checked_sub(1)?;
        self.start_date.checked_add_days(Days::new(u64::from(last)))
    }

    /// Every date of the course, in order, using calendar arithmetic so
    /// month and year boundaries roll over correctly.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..u64::from(self.duration_days))
            .map_while(move |offset| self.start_date.checked_add_days(Days::new(offset)))
    }

    /// Whether the course has a dose on `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.end_date()
            .is_some_and(|end| self.start_date <= date && date <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_assigns_id_and_trims_name() {
        let entry = MedicationEntry::new("  타이레놀 ", 3, 2, date(2025, 11, 9)).unwrap();
        assert!(entry.id.is_some());
        assert_eq!(entry.name, "타이레놀");

        let other = MedicationEntry::new("타이레놀", 3, 2, date(2025, 11, 9)).unwrap();
        assert_ne!(entry.id, other.id);
    }

    #[test]
    fn test_validation_errors() {
        let start = date(2025, 1, 1);
        assert_eq!(
            MedicationEntry::new("   ", 1, 1, start),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(
            MedicationEntry::new("A", 0, 1, start),
            Err(ValidationError::TimesPerDay(0))
        );
        assert_eq!(
            MedicationEntry::new("A", 5, 1, start),
            Err(ValidationError::TimesPerDay(5))
        );
        assert_eq!(
            MedicationEntry::new("A", 2, 0, start),
            Err(ValidationError::ZeroDuration)
        );
        assert_eq!(
            MedicationEntry::new("A", 4, 50_000_000, start),
            Err(ValidationError::TooLong(50_000_000))
        );
        assert!(MedicationEntry::new("A", 4, MAX_DURATION_DAYS, start).is_ok());
        assert!(matches!(
            MedicationEntry::new("A", 1, 3, NaiveDate::MAX),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_dates_roll_over_month_boundary() {
        let entry = MedicationEntry::new("A", 1, 5, date(2025, 1, 30)).unwrap();
        let dates: Vec<NaiveDate> = entry.dates().collect();
        assert_eq!(
            dates,
            vec![
                date(2025, 1, 30),
                date(2025, 1, 31),
                date(2025, 2, 1),
                date(2025, 2, 2),
                date(2025, 2, 3),
            ]
        );
        assert_eq!(entry.end_date(), Some(date(2025, 2, 3)));
    }

    #[test]
    fn test_dates_roll_over_year_and_leap_day() {
        let entry = MedicationEntry::new("A", 1, 3, date(2023, 12, 31)).unwrap();
        assert_eq!(entry.end_date(), Some(date(2024, 1, 2)));

        let leap = MedicationEntry::new("A", 1, 2, date(2024, 2, 28)).unwrap();
        let dates: Vec<NaiveDate> = leap.dates().collect();
        assert_eq!(dates, vec![date(2024, 2, 28), date(2024, 2, 29)]);
    }

    #[test]
    fn test_covers() {
        let entry = MedicationEntry::new("A", 2, 3, date(2025, 3, 1)).unwrap();
        assert!(!entry.covers(date(2025, 2, 28)));
        assert!(entry.covers(date(2025, 3, 1)));
        assert!(entry.covers(date(2025, 3, 3)));
        assert!(!entry.covers(date(2025, 3, 4)));
    }

    #[test]
    fn test_key_and_slots() {
        let entry = MedicationEntry::new("A", 2, 3, date(2025, 3, 1)).unwrap();
        let key = entry.key();
        assert_eq!(key.name, "A");
        assert_eq!(key.times_per_day, 2);
        assert_eq!(key.duration_days, 3);
        assert_eq!(entry.slots(), &[TimeSlot::Morning, TimeSlot::Evening]);
    }

    #[test]
    fn test_registry_json_uses_camel_case() {
        let entry = MedicationEntry::new("A", 2, 3, date(2025, 3, 1)).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["timesPerDay"], 2);
        assert_eq!(json["durationDays"], 3);
        assert_eq!(json["startDate"], "2025-03-01");

        let legacy: MedicationEntry = serde_json::from_str(
            r#"{"name":"B","timesPerDay":1,"durationDays":2,"startDate":"2025-03-01"}"#,
        )
        .unwrap();
        assert_eq!(legacy.id, None);
    }
}
