//! # SlotPilot Core
//!
//! The slot data model and classification rules, plus configuration and the
//! shared error type. Everything else in the workspace builds on this crate.

pub mod config;
pub mod error;
pub mod slot;

pub use config::SlotPilotConfig;
pub use error::{Result, SlotPilotError};
pub use slot::{Slot, SlotCategory, SlotKey, SlotStatus, Week};
