use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// One of the four fixed dose times of a day, in dose order.
///
/// Serialized as its clock time (`"08:00"`), which is how the schedule file
/// names its buckets.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeSlot {
    #[serde(rename = "08:00")]
    Morning,
    #[serde(rename = "12:00")]
    Midday,
    #[serde(rename = "18:00")]
    Evening,
    #[serde(rename = "22:00")]
    Bedtime,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown time slot '{0}' (use 08:00, 12:00, 18:00, 22:00 or morning/midday/evening/bedtime)")]
pub struct UnknownSlot(pub String);

const ONE_A_DAY: [TimeSlot; 1] = [TimeSlot::Morning];
const TWO_A_DAY: [TimeSlot; 2] = [TimeSlot::Morning, TimeSlot::Evening];
const THREE_A_DAY: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Midday, TimeSlot::Evening];

impl TimeSlot {
    pub const ALL: [TimeSlot; 4] = [
        TimeSlot::Morning,
        TimeSlot::Midday,
        TimeSlot::Evening,
        TimeSlot::Bedtime,
    ];

    pub fn hour(self) -> u32 {
        match self {
            Self::Morning => 8,
            Self::Midday => 12,
            Self::Evening => 18,
            Self::Bedtime => 22,
        }
    }

    /// Korean label shown next to the clock time.
    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "아침",
            Self::Midday => "점심",
            Self::Evening => "저녁",
            Self::Bedtime => "취침",
        }
    }

    pub fn starts_at(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), 0, 0).unwrap_or(NaiveTime::MIN)
    }

    /// `HH:00`, 24-hour.
    pub fn clock_text(self) -> String {
        format!("{:02}:00", self.hour())
    }

    /// Slots taken for a given number of doses per day.
    /// Returns `None` outside 1..=4.
    pub fn for_times_per_day(times_per_day: u8) -> Option<&'static [TimeSlot]> {
        match times_per_day {
            1 => Some(&ONE_A_DAY),
            2 => Some(&TWO_A_DAY),
            3 => Some(&THREE_A_DAY),
            4 => Some(&Self::ALL),
            _ => None,
        }
    }

    /// The dose window `time` falls in. Anything before noon (including the
    /// early morning hours before 08:00) belongs to the morning window.
    pub fn window_for(time: NaiveTime) -> TimeSlot {
        match time.hour() {
            0..=11 => Self::Morning,
            12..=17 => Self::Midday,
            18..=21 => Self::Evening,
            _ => Self::Bedtime,
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clock_text())
    }
}

impl FromStr for TimeSlot {
    type Err = UnknownSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let named = match trimmed.to_lowercase().as_str() {
            "morning" | "breakfast" | "아침" => Some(Self::Morning),
            "noon" | "midday" | "lunch" | "점심" => Some(Self::Midday),
            "evening" | "dinner" | "저녁" => Some(Self::Evening),
            "bedtime" | "night" | "취침" => Some(Self::Bedtime),
            _ => None,
        };
        if let Some(slot) = named {
            return Ok(slot);
        }

        parse_time(trimmed)
            .filter(|time| time.minute() == 0)
            .and_then(|time| Self::ALL.into_iter().find(|slot| slot.hour() == time.hour()))
            .ok_or_else(|| UnknownSlot(trimmed.to_string()))
    }
}

/// Parse a time of day.
/// Accepts flexible formats:
/// - HH:MM format: "08:00", "8:00", "8:5" (with or without leading zeros)
/// - Hour only: "8", "08" (defaults to :00)
pub fn parse_time(time_str: &str) -> Option<NaiveTime> {
    let trimmed = time_str.trim();

    let (hour, minute) = if trimmed.contains(':') {
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 2 {
            return None;
        }
        (
            parts[0].trim().parse::<u32>().ok()?,
            parts[1].trim().parse::<u32>().ok()?,
        )
    } else {
        (trimmed.parse::<u32>().ok()?, 0)
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parse a calendar date written as `YYYY-MM-DD` or `YYYY/MM/DD`.
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let trimmed = date_str.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
        .ok()
}
