use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

/// Condition assigned to a diary entry by the upstream classifier.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Danger,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown health status '{0}' (expected healthy, warning or danger)")]
pub struct UnknownStatus(pub String);

impl HealthStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "좋음",
            Self::Warning => "주의",
            Self::Danger => "위험",
        }
    }
}

impl FromStr for HealthStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "healthy" => Ok(Self::Healthy),
            "warning" => Ok(Self::Warning),
            "danger" => Ok(Self::Danger),
            _ => Err(UnknownStatus(s.trim().to_string())),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiaryEntry {
    pub content: String,
    #[serde(default, deserialize_with = "known_status")]
    pub status: Option<HealthStatus>,
}

/// Reads a stored status, dropping values outside the known set instead of
/// failing the whole diary.
fn known_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<HealthStatus>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| match raw.parse::<HealthStatus>() {
        Ok(status) => Some(status),
        Err(err) => {
            warn!("ignoring stored diary status: {}", err);
            None
        }
    }))
}

/// Health diary, one entry per day.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Diary {
    entries: BTreeMap<NaiveDate, DiaryEntry>,
}

impl Diary {
    /// Writes the entry for `date`, replacing any earlier one.
    /// Returns the replaced entry.
    pub fn record(
        &mut self,
        date: NaiveDate,
        content: impl Into<String>,
        status: Option<HealthStatus>,
    ) -> Option<DiaryEntry> {
        self.entries.insert(
            date,
            DiaryEntry {
                content: content.into(),
                status,
            },
        )
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DiaryEntry> {
        self.entries.get(&date)
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = (NaiveDate, &DiaryEntry)> {
        self.entries
            .iter()
            .rev()
            .take(limit)
            .map(|(date, entry)| (*date, entry))
    }
}
