use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Timelike, Utc};
use figment::{
    providers::{Env, Format, Json},
    Figment,
};
use lettre::{message::header::ContentType, Message};
use log::{debug, info, warn};

use crate::slot_check::{
    errors::{NotifyError, ScrapeError, SlotParseError},
    models::{
        slot_model::{RawField, RawSlot, Slot, SlotSet},
        Args, Category, Config, EmailConfig,
    },
};

/* formats seen on the scheduling site and in its JSON responses */
const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%B %d, %Y",
    "%A %B %d, %Y",
    "%A, %B %d, %Y",
    "%m/%d/%Y",
    "%d %B %Y",
    "%Y/%m/%d",
];
const TIME_FORMATS: [&str; 4] = ["%I:%M %p", "%I:%M%p", "%H:%M", "%H:%M:%S"];

/// Day numbers in the scheduling system count days since this date.
fn day_number_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1840, 12, 31).unwrap_or_default()
}

pub fn read_config(args: &Args) -> Result<Config, figment::Error> {
    info!(
        "Reading config from {}",
        std::path::absolute(&args.config_json_path)
            .unwrap_or_else(|_| args.config_json_path.clone())
            .display()
    );
    Figment::new()
        .merge(Json::file(&args.config_json_path))
        .merge(Env::prefixed("SLOT_"))
        .merge(Env::raw().only(&["github_token", "github_repository"]))
        .extract()
}

pub fn parse_slot_date(raw: &RawField) -> Result<NaiveDate, SlotParseError> {
    match raw {
        RawField::Number(days) => u64::try_from(*days)
            .ok()
            .and_then(|days| day_number_epoch().checked_add_days(Days::new(days)))
            .ok_or_else(|| SlotParseError::Date(days.to_string())),
        RawField::Text(text) => {
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
                .ok_or(SlotParseError::Date(text))
        }
        RawField::Other(value) => Err(SlotParseError::Date(value.to_string())),
    }
}

/// Parses "9:00 AM", "9:00am", "09:00" or "14:30:00" into a minute-precision time.
pub fn parse_slot_time(raw: &RawField) -> Result<NaiveTime, SlotParseError> {
    let RawField::Text(text) = raw else {
        return Err(SlotParseError::Time(raw.display()));
    };
    let cleaned = text
        .replace('.', "")
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&cleaned, format).ok())
        .and_then(|time| time.with_second(0))
        .ok_or_else(|| SlotParseError::Time(text.trim().to_owned()))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

pub fn normalize_slot(raw: &RawSlot, category: Category) -> Result<Slot, SlotParseError> {
    let date = parse_slot_date(raw.date.as_ref().ok_or(SlotParseError::Missing("date"))?)?;
    let time = parse_slot_time(raw.time.as_ref().ok_or(SlotParseError::Missing("time"))?)?;
    Ok(Slot {
        date,
        time,
        category,
        provider: non_empty(&raw.provider),
        location: non_empty(&raw.department),
        raw_label: raw.label_or_default(),
    })
}

/// Turns scraped rows into a slot set. Bad rows are dropped with a warning;
/// the scrape only counts as failed when rows came back and none of them parsed.
pub fn normalize_slots(rows: &[RawSlot], category: Category) -> Result<SlotSet, ScrapeError> {
    let mut slots = SlotSet::new();
    let mut failed = 0;
    for row in rows {
        match normalize_slot(row, category) {
            Ok(slot) => {
                if slots.contains(&slot) {
                    debug!("Skipping duplicate slot {}", slot.display_str());
                } else {
                    slots.insert(slot);
                }
            }
            Err(err) => {
                warn!("Dropping row '{}': {}", row.label_or_default(), err);
                failed += 1;
            }
        }
    }
    if slots.is_empty() && failed > 0 {
        return Err(ScrapeError::Unparsable { rows: failed });
    }
    info!(
        "Parsed {} {} slots ({} rows dropped)",
        slots.len(),
        category,
        failed
    );
    Ok(slots)
}

/// Outcome of comparing two checks of one category.
#[derive(Debug, Default, PartialEq)]
pub struct SlotDiff {
    /// Slots of the current check that the previous one did not have.
    pub new: SlotSet,
    /// Slots of the previous check that are no longer offered.
    pub gone: SlotSet,
}

pub fn diff_slots(previous: &SlotSet, current: &SlotSet) -> SlotDiff {
    SlotDiff {
        new: current.difference(previous).cloned().collect(),
        gone: previous.difference(current).cloned().collect(),
    }
}

pub fn log_slots(title: &str, slots: &SlotSet) {
    for slot in slots.iter() {
        info!("{} {}", title, slot.display_str());
    }
}

pub fn generate_issue_title(category: Category, slots: &SlotSet) -> String {
    let earliest = slots
        .first()
        .map(|slot| slot.date.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!(
        "🦷 {} New {} Dental Appointment(s) Available - {}",
        slots.len(),
        category.title(),
        earliest
    )
}

/* markdown body shared by the issue and the email, without their footers */
pub fn generate_slots_body(
    category: Category,
    slots: &SlotSet,
    booking_url: &str,
    detected_at: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "## New Appointment Slots Detected".to_owned(),
        String::new(),
        format!("**Category:** {}", category.title()),
        format!(
            "**Detected at:** {} UTC",
            detected_at.format("%Y-%m-%d %H:%M:%S")
        ),
        String::new(),
        "### Available Slots".to_owned(),
        String::new(),
    ];

    let mut by_date: BTreeMap<NaiveDate, Vec<&Slot>> = BTreeMap::new();
    for slot in slots.iter() {
        by_date.entry(slot.date).or_default().push(slot);
    }

    for (date, day_slots) in by_date {
        lines.push(format!("#### {}", date.format("%Y-%m-%d")));
        for slot in day_slots {
            let mut details = vec![format!("**{}**", slot.time.format("%H:%M"))];
            if let Some(provider) = &slot.provider {
                details.push(format!("Provider: {}", provider));
            }
            if let Some(location) = &slot.location {
                details.push(format!("Location: {}", location));
            }
            lines.push(format!("- {}", details.join(" | ")));
        }
        lines.push(String::new());
    }

    lines.extend([
        "---".to_owned(),
        String::new(),
        "### Quick Links".to_owned(),
        String::new(),
        format!("[Book Appointment]({})", booking_url),
    ]);

    lines.join("\n")
}

pub fn generate_issue_body(
    category: Category,
    slots: &SlotSet,
    booking_url: &str,
    detected_at: DateTime<Utc>,
) -> String {
    format!(
        "{}\n\n---\n*This issue was automatically created by the appointment checker.*",
        generate_slots_body(category, slots, booking_url, detected_at)
    )
}

pub fn generate_email(
    config: &EmailConfig,
    category: Category,
    slots: &SlotSet,
    booking_url: &str,
    detected_at: DateTime<Utc>,
) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(format!("{} <{}>", config.sender_fullname, config.sender_username).parse()?)
        .subject(generate_issue_title(category, slots))
        .header(ContentType::TEXT_PLAIN);
    for recipient in config.recipients.iter() {
        builder = builder.to(recipient.parse()?);
    }
    let email = builder.body(format!(
        "{}\n\nThis letter was generated automatically, no reply is expected.",
        generate_slots_body(category, slots, booking_url, detected_at)
    ))?;
    Ok(email)
}

#[cfg(test)]
#[path = "tests/tests.rs"]
mod tests;
