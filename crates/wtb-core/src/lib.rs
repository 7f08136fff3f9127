//! Core domain + application logic for the weather Telegram bot.
//!
//! This crate is framework-agnostic. Telegram and the HTTP weather services
//! live behind ports (traits) implemented in adapter crates.

pub mod bot;
pub mod cache;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod housekeeping;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod presence;
pub mod settings;
pub mod weather;

pub use errors::{Error, Result};
