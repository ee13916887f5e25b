use std::{fmt, path::PathBuf};

use clap::{command, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

pub mod slot_model;

/// Appointment type being monitored.
/// 1. Student is the pre-doctoral clinic, checked by default
/// 2. Faculty is the faculty practice
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Student,
    Faculty,
}

impl Category {
    /// Name used for file names and the scraper helper's arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Student => "student",
            Category::Faculty => "faculty",
        }
    }

    /// Capitalized name used in notifications.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Student => "Student",
            Category::Faculty => "Faculty",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model for describing ARGS of the tool.
/// Consists of:
/// 1. Category of appointments to check.
/// 2. Dry-run switch, that suppresses both notifications and history updates.
/// 3. Debug switch, that only affects logging.
/// 4. Path to config.json, that contains scraper, history and notifier parameters.
/// 5. Optional path to a JSON file with already scraped rows, used instead of the scraper helper.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, value_enum, default_value_t = Category::Student)]
    pub category: Category,
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub debug: bool,
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    pub config_json_path: PathBuf,
    #[arg(long, value_name = "FILE")]
    pub slots_file: Option<PathBuf>,
}

/// A model for describing configuration of the tool.
/// Every field is optional in config.json, so a missing file still yields a usable config
/// (with notifications disabled).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,
    #[serde(default)]
    pub scraper_command: Vec<String>,
    #[serde(default)]
    pub github_repository: Option<String>,
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,
    /// Seconds a single GitHub API request may take.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_booking_url")]
    pub booking_url: String,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

/// SMTP parameters for the email notifier.
/// Consists of:
/// 1. SMTP server address
/// 2. Email address from which the letters will be sent
/// 3. Email sender display name, that will be shown in the letter
/// 4. Password for email account from which the letters will be sent
/// 5. Addresses that receive the alerts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub relay: String,
    pub sender_username: String,
    pub sender_fullname: String,
    pub sender_password: String,
    pub recipients: Vec<String>,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_owned()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_booking_url() -> String {
    "https://ucsfmychart.ucsfmedicalcenter.org/UCSFMyChart/Scheduling/Embedded?dept=3202010,3202011&vt=1148".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            history_dir: default_history_dir(),
            scraper_command: Vec::new(),
            github_repository: None,
            github_token: None,
            github_api_base: default_github_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
            booking_url: default_booking_url(),
            email: None,
        }
    }
}
