//! Watches an appointment scheduling site for newly opened slots.

pub mod errors;
pub mod helpers;
pub mod models;
pub mod run_tool;
pub mod slot_getter;
pub mod slot_notifier;
pub mod slot_store;
