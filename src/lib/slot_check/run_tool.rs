use std::fmt;

use log::{error, info, warn};

use super::{
    errors::RunError,
    helpers::{diff_slots, log_slots, normalize_slots},
    models::{
        slot_model::{SlotRecord, SlotSet},
        Category,
    },
    slot_getter::SlotGetter,
    slot_notifier::SlotNotifier,
    slot_store::SlotStore,
};

/// What a finished check did.
#[derive(Debug)]
pub struct RunSummary {
    pub category: Category,
    pub dry_run: bool,
    pub previous_count: usize,
    pub current_count: usize,
    pub new_slots: SlotSet,
    pub gone_slots: SlotSet,
    pub notified: bool,
    /// Issue URL or recipients, when the notification went out.
    pub notification_ref: Option<String>,
    /// Why the notification about new slots was not delivered.
    pub notify_error: Option<String>,
    pub persisted: bool,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "category: {}, previous: {}, current: {}, new: {}, gone: {}, notified: {}{}, persisted: {}{}",
            self.category,
            self.previous_count,
            self.current_count,
            self.new_slots.len(),
            self.gone_slots.len(),
            yes_no(self.notified),
            if self.notify_error.is_some() { " (notify failed)" } else { "" },
            yes_no(self.persisted),
            if self.dry_run { " (dry run)" } else { "" }
        )
    }
}

/// One check cycle: scrape, load, diff, notify, persist.
///
/// A failed scrape returns before the history is read or written. A failed notification is
/// only logged: the slots were really seen, so they are persisted either way and will not be
/// reported again. In dry-run mode nothing is notified or written.
pub async fn run<SG: SlotGetter, SN: SlotNotifier>(
    slot_getter: &SG,
    notifier: &SN,
    store: &SlotStore,
    category: Category,
    dry_run: bool,
) -> Result<RunSummary, RunError> {
    info!("Starting {} appointment check", category);

    let current = slot_getter
        .get_slots(category)
        .await
        .and_then(|rows| normalize_slots(&rows, category))
        .inspect_err(|err| error!("Could not get {} slots: {}", category, err))?;
    info!("Found {} current {} slots", current.len(), category);

    let previous_record = store.load_record(category);
    let previous = previous_record
        .as_ref()
        .map(SlotRecord::slot_set)
        .unwrap_or_default();
    info!("Loaded {} previous {} slots", previous.len(), category);
    let diff = diff_slots(&previous, &current);
    info!(
        "Slot comparison: {} new, {} gone, {} unchanged",
        diff.new.len(),
        diff.gone.len(),
        current.len() - diff.new.len()
    );
    log_slots("Gone:", &diff.gone);

    let mut notification_ref = None;
    let mut notify_error = None;
    if diff.new.is_empty() {
        info!("No new slots detected");
    } else {
        info!("Detected {} NEW appointment slots!", diff.new.len());
        log_slots("New:", &diff.new);
        if dry_run {
            info!("Dry run - skipping notification");
        } else {
            match notifier.notify(category, &diff.new).await {
                Ok(reference) => {
                    info!("Notification sent: {}", reference);
                    notification_ref = Some(reference);
                }
                Err(err) => {
                    warn!("Notification failed, history is updated anyway: {}", err);
                    notify_error = Some(err.to_string());
                }
            }
        }
    }

    let persisted = if dry_run {
        info!("Dry run - skipping history update");
        false
    } else {
        let checks = previous_record
            .map(|record| record.checks)
            .unwrap_or_default();
        store.save_check(category, &current, diff.new.len(), checks)?;
        true
    };

    Ok(RunSummary {
        category,
        dry_run,
        previous_count: previous.len(),
        current_count: current.len(),
        new_slots: diff.new,
        gone_slots: diff.gone,
        notified: notification_ref.is_some(),
        notification_ref,
        notify_error,
        persisted,
    })
}
