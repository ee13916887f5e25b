//! Error kinds of a check run.
//!
//! Only [`RunError`] aborts a run. Row, history and notification failures are recovered where
//! they happen and end up as warnings in the log.

use thiserror::Error;

/// A single scraped row could not be turned into a slot.
#[derive(Error, Debug, PartialEq)]
pub enum SlotParseError {
    #[error("row has no {0}")]
    Missing(&'static str),
    #[error("unrecognized date '{0}'")]
    Date(String),
    #[error("unrecognized time '{0}'")]
    Time(String),
}

/// The scraper did not produce a usable slot list.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("scraper command is not configured")]
    NotConfigured,
    #[error("scraper command failed: {0}")]
    Command(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unreadable scraper output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scraper reported failure: {0}")]
    Reported(String),
    #[error("none of {rows} scraped rows could be parsed")]
    Unparsable { rows: usize },
}

/// The history file could not be written.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The notification could not be delivered.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("no notifier is configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("email error: {0}")]
    Email(String),
}

impl From<lettre::address::AddressError> for NotifyError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotifyError::Email(err.to_string())
    }
}

impl From<lettre::error::Error> for NotifyError {
    fn from(err: lettre::error::Error) -> Self {
        NotifyError::Email(err.to_string())
    }
}

/// Failures that abort the run with a non-zero exit.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),
    #[error("could not persist slot history: {0}")]
    Store(#[from] StoreError),
}
