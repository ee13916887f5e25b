//! Module with slot models: rows as the scraper reports them, and their normalized form.
use std::{
    cmp::Ordering,
    collections::BTreeSet,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

/// A scalar as it appears in the scraper output. Dates may come as text or as a day number.
#[derive(Deserialize, Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawField {
    Text(String),
    Number(i64),
    Other(serde_json::Value),
}

impl RawField {
    pub fn display(&self) -> String {
        match self {
            RawField::Text(text) => text.trim().to_owned(),
            RawField::Number(number) => number.to_string(),
            RawField::Other(value) => value.to_string(),
        }
    }
}

/// One appointment row, exactly as the scraper extracted it.
#[derive(Deserialize, Debug, Serialize, Clone, Default, PartialEq)]
pub struct RawSlot {
    #[serde(default, alias = "Date", alias = "AppointmentDate", alias = "StartDate")]
    pub date: Option<RawField>,
    #[serde(default, alias = "Time", alias = "StartTime", alias = "DisplayTime")]
    pub time: Option<RawField>,
    #[serde(default, alias = "Provider", alias = "ProviderName")]
    pub provider: Option<String>,
    #[serde(default, alias = "Department", alias = "DepartmentName")]
    pub department: Option<String>,
    #[serde(default, alias = "Label", alias = "DisplayLabel")]
    pub label: Option<String>,
}

impl RawSlot {
    pub fn new(date: &str, time: &str) -> Self {
        RawSlot {
            date: Some(RawField::Text(date.to_owned())),
            time: Some(RawField::Text(time.to_owned())),
            ..Default::default()
        }
    }

    /// Label to keep for display when the scraper did not give one.
    pub fn label_or_default(&self) -> String {
        if let Some(label) = self.label.as_deref().map(str::trim) {
            if !label.is_empty() {
                return label.to_owned();
            }
        }
        let field = |f: &Option<RawField>| f.as_ref().map(RawField::display).unwrap_or_default();
        format!("{} {}", field(&self.date), field(&self.time))
            .trim()
            .to_owned()
    }
}

/// Normalized appointment slot.
///
/// Two slots are the same slot iff their `(date, time, category)` match; provider, location and
/// label are carried for display only, since the site redisplays a slot with small label changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub raw_label: String,
}

impl Slot {
    pub fn key(&self) -> (NaiveDate, NaiveTime, Category) {
        (self.date, self.time, self.category)
    }

    /// Human-readable representation, e.g. `2024-05-01 at 09:00 with Dr. Rai at Dental Center`.
    pub fn display_str(&self) -> String {
        let mut parts = vec![format!(
            "{} at {}",
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M")
        )];
        if let Some(provider) = &self.provider {
            parts.push(format!("with {}", provider));
        }
        if let Some(location) = &self.location {
            parts.push(format!("at {}", location));
        }
        parts.join(" ")
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Slot {}

impl Hash for Slot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Slots of one category seen in one check, unique by identity.
pub type SlotSet = BTreeSet<Slot>;

/// One line of the check log kept next to the slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckRecord {
    pub timestamp: DateTime<Utc>,
    pub slot_count: usize,
    pub new_count: usize,
}

/// Content of a per-category history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRecord {
    pub category: Category,
    pub updated_at: DateTime<Utc>,
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub checks: Vec<CheckRecord>,
}

impl SlotRecord {
    pub fn slot_set(&self) -> SlotSet {
        self.slots.iter().cloned().collect()
    }
}

/// Times are stored as 24-hour `HH:MM`.
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&text, "%H:%M").map_err(de::Error::custom)
    }
}
