//! # SlotPilot Store
//!
//! SQLite-backed key-value storage area (the durable store every execution
//! context shares) and the per-week waiting list built on top of it.

pub mod notify;
pub mod storage;
pub mod waiting;

pub use notify::{Notification, Notifier, NotifyPriority, NotifyRouter};
pub use storage::{keys, StorageArea};
pub use waiting::{AddOutcome, WaitingLists, WaitingStore};
