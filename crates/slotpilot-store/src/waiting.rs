//! The waiting list — a durable, de-duplicated, per-week queue of slots.
//!
//! Every operation is a fresh read-modify-write cycle against the storage
//! area: nothing is cached across calls, so a restarted process (or a
//! concurrent context) always works from current state. Updates are keyed by
//! slot identity, which keeps the cycle idempotent when two contexts race.

use std::collections::BTreeMap;
use std::sync::Arc;

use slotpilot_core::error::Result;
use slotpilot_core::slot::{Slot, SlotKey, SlotStatus, Week};

use crate::notify::{Notifier, NotifyPriority};
use crate::storage::{keys, StorageArea};

/// Map of week token to ordered slot queue, as persisted under `waitingList`.
pub type WaitingLists = BTreeMap<Week, Vec<Slot>>;

/// Outcome of an `add` call, used to pick the user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyQueued,
}

/// Durable per-week waiting list.
pub struct WaitingStore {
    storage: Arc<StorageArea>,
    notifier: Arc<Notifier>,
}

impl WaitingStore {
    pub fn new(storage: Arc<StorageArea>, notifier: Arc<Notifier>) -> Self {
        Self { storage, notifier }
    }

    /// Load all week queues from storage.
    pub fn load(&self) -> Result<WaitingLists> {
        Ok(self
            .storage
            .get::<WaitingLists>(keys::WAITING_LIST)?
            .unwrap_or_default())
    }

    fn save(&self, lists: &WaitingLists) -> Result<()> {
        self.storage.set(keys::WAITING_LIST, lists)
    }

    /// Which week the tracked page currently displays; `this` until set.
    pub fn current_week(&self) -> Result<Week> {
        Ok(self
            .storage
            .get::<Week>(keys::CURRENT_WEEK_STATE)?
            .unwrap_or(Week::This))
    }

    pub fn set_current_week(&self, week: Week) -> Result<()> {
        self.storage.set(keys::CURRENT_WEEK_STATE, &week)
    }

    /// Queue a slot for automatic booking.
    ///
    /// The week defaults to the currently tracked one; the status is forced
    /// to `waiting` unless the slot is already reserved. Adding a slot whose
    /// identity is already queued is a no-op (not an error) — the outcome
    /// tells the two cases apart. New entries go to the front of the queue.
    pub fn add(&self, mut slot: Slot) -> Result<AddOutcome> {
        if slot.status != SlotStatus::Success {
            slot.status = SlotStatus::Waiting;
        }
        let week = match slot.week {
            Some(week) => week,
            None => {
                let week = self.current_week()?;
                slot.week = Some(week);
                week
            }
        };

        let mut lists = self.load()?;
        let queue = lists.entry(week).or_default();
        let key = slot.key();
        if queue.iter().any(|entry| entry.matches(&key)) {
            tracing::debug!("Slot already queued for week {week}: {key}");
            self.notifier.notify(
                "Already on waiting list",
                &format!("{} ({})", slot.name, slot.day),
                "waiting-list",
                NotifyPriority::Normal,
            );
            return Ok(AddOutcome::AlreadyQueued);
        }

        let title = if slot.status == SlotStatus::Success {
            "Booking confirmed"
        } else {
            "Added to waiting list"
        };
        let body = format!("{} ({})", slot.name, slot.day);
        queue.insert(0, slot);
        self.save(&lists)?;
        tracing::info!("📅 Queued slot for week {week}: {key}");
        self.notifier
            .notify(title, &body, "waiting-list", NotifyPriority::Normal);
        Ok(AddOutcome::Added)
    }

    /// Rewrite the status of the slot with this identity, wherever it is
    /// queued. Silently a no-op when no queue holds the identity.
    pub fn update_status(&self, key: &SlotKey, status: SlotStatus) -> Result<()> {
        let mut lists = self.load()?;
        let mut touched = false;
        for queue in lists.values_mut() {
            for entry in queue.iter_mut().filter(|entry| entry.matches(key)) {
                entry.status = status;
                touched = true;
            }
        }
        if touched {
            tracing::info!("🔄 Status of {key} set to {status:?}");
            self.save(&lists)?;
        }
        Ok(())
    }

    /// Remove the identity from every week's queue.
    pub fn remove(&self, key: &SlotKey) -> Result<()> {
        let mut lists = self.load()?;
        for queue in lists.values_mut() {
            queue.retain(|entry| !entry.matches(key));
        }
        self.save(&lists)
    }

    /// Whether any week's queue holds this identity.
    pub fn contains(&self, key: &SlotKey) -> Result<bool> {
        let lists = self.load()?;
        Ok(lists
            .values()
            .any(|queue| queue.iter().any(|entry| entry.matches(key))))
    }

    /// Peek at the front of a week's queue.
    pub fn head_of(&self, week: Week) -> Result<Option<Slot>> {
        let lists = self.load()?;
        Ok(lists.get(&week).and_then(|queue| queue.first().cloned()))
    }

    /// Remove and return the front entry of a week's queue. The head is
    /// always the next-to-resolve item, so this is identity-independent.
    pub fn pop_head(&self, week: Week) -> Result<Option<Slot>> {
        let mut lists = self.load()?;
        let popped = match lists.get_mut(&week) {
            Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
            _ => None,
        };
        if popped.is_some() {
            self.save(&lists)?;
        }
        Ok(popped)
    }
}
