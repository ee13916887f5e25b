use std::path::PathBuf;

use log::{debug, info};
use serde::Deserialize;
use tokio::process::Command;

use super::{
    errors::ScrapeError,
    models::{slot_model::RawSlot, Category},
};

/// A trait, necessary for every entity that will be used for getting currently offered slots.
/// Any error means the slot list is unknown, which is different from an empty list.
#[allow(async_fn_in_trait)]
pub trait SlotGetter {
    async fn get_slots(&self, category: Category) -> Result<Vec<RawSlot>, ScrapeError>;
}

/// What a scraper prints: either the bare rows, or a report that can carry a failure.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ScrapeOutput {
    Rows(Vec<RawSlot>),
    Report {
        success: bool,
        #[serde(default)]
        slots: Vec<RawSlot>,
        #[serde(default)]
        error: Option<String>,
    },
}

pub fn parse_scrape_output(text: &str) -> Result<Vec<RawSlot>, ScrapeError> {
    match serde_json::from_str::<ScrapeOutput>(text)? {
        ScrapeOutput::Rows(rows) => Ok(rows),
        ScrapeOutput::Report {
            success: true,
            slots,
            ..
        } => Ok(slots),
        ScrapeOutput::Report {
            success: false,
            error,
            ..
        } => Err(ScrapeError::Reported(
            error.unwrap_or_else(|| "no details given".to_owned()),
        )),
    }
}

/// Runs the external scraper helper (the browser automation) and reads its stdout.
/// The category is passed as `--category <student|faculty>`.
#[derive(Debug, Clone)]
pub struct CommandGetter {
    pub command: Vec<String>,
}

impl SlotGetter for CommandGetter {
    async fn get_slots(&self, category: Category) -> Result<Vec<RawSlot>, ScrapeError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(ScrapeError::NotConfigured)?;
        info!("Running scraper {} for {} slots", program, category);
        let output = Command::new(program)
            .args(args)
            .arg("--category")
            .arg(category.as_str())
            .output()
            .await?;
        if !output.status.success() {
            return Err(ScrapeError::Command(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("Scraper output: {}", stdout);
        let rows = parse_scrape_output(&stdout)?;
        info!("Scraper returned {} rows", rows.len());
        Ok(rows)
    }
}

/// Reads rows a scraper saved earlier. Used for local testing.
#[derive(Debug, Clone)]
pub struct FileGetter {
    pub path: PathBuf,
}

impl SlotGetter for FileGetter {
    async fn get_slots(&self, category: Category) -> Result<Vec<RawSlot>, ScrapeError> {
        info!(
            "Reading scraped {} slots from {}",
            category,
            self.path.display()
        );
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_scrape_output(&text)
    }
}
