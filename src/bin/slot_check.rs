use lib::slot_check::{helpers, models, run_tool, slot_getter, slot_notifier, slot_store};

use std::process::ExitCode;

use clap::Parser;
use helpers::read_config;
use log::{error, info};
use models::Args;
use run_tool::run;
use slot_getter::{CommandGetter, FileGetter};
use slot_notifier::Notifier;
use slot_store::SlotStore;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    /* Setup logging */
    env_logger::builder()
        .target(env_logger::Target::Stdout)
        .filter_level(if args.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    /* Get all the required resources */
    let config = match read_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let store = SlotStore::new(&config.history_dir);
    let notifier = match Notifier::from_config(&config) {
        Ok(notifier) => notifier,
        Err(err) => {
            error!("Could not set up notifier: {}", err);
            return ExitCode::FAILURE;
        }
    };

    /* Check, compare, notify, persist */
    let result = match &args.slots_file {
        Some(path) => {
            let getter = FileGetter { path: path.clone() };
            run(&getter, &notifier, &store, args.category, args.dry_run).await
        }
        None => {
            let getter = CommandGetter {
                command: config.scraper_command.clone(),
            };
            run(&getter, &notifier, &store, args.category, args.dry_run).await
        }
    };

    match result {
        Ok(summary) => {
            info!("Check finished - {}", summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(
                "Check failed - category: {}, notified: no, persisted: no, error: {}",
                args.category, err
            );
            ExitCode::FAILURE
        }
    }
}
