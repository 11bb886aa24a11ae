//! # TeamTask Worker Library
//!
//! Background maintenance for the TeamTask stores: purging expired refresh
//! tokens and sending due-date reminders.
//!
//! ## Modules
//!
//! - `config`: Environment configuration
//! - `notifier`: Reminder delivery
//! - `orchestrator`: Interval scheduling and shutdown
//! - `sweepers`: The maintenance jobs

pub mod config;
pub mod notifier;
pub mod orchestrator;
pub mod sweepers;
