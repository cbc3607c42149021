//! The booking action — claim one slot on the live page.
//!
//! Re-scans the current rows with the same heading-date cursor the scanner
//! uses, matches the slot identity, opens the row, waits for the overlay to
//! settle and presses the confirmation control. One attempt, one outcome.

use std::time::Duration;

use slotpilot_core::slot::Slot;

use crate::session::Portal;
use crate::snapshot::{PageRow, PageSnapshot};

/// Result of a single booking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    Success,
    Failed,
}

/// Locate the snapshot row matching the slot identity: the heading cursor
/// must be on the slot's date, the title must contain the name, and the
/// first part of the time range must equal the start time.
pub fn find_slot_row(snapshot: &PageSnapshot, slot: &Slot) -> Option<usize> {
    let mut current_date = String::new();
    for (index, row) in snapshot.rows.iter().enumerate() {
        match row {
            PageRow::Heading { date, .. } => current_date = date.clone(),
            PageRow::Item {
                time_text, title, ..
            } => {
                let start = time_text.split(" - ").next().unwrap_or("").trim();
                if current_date == slot.date
                    && title.contains(&slot.name)
                    && start == slot.start
                {
                    return Some(index);
                }
            }
        }
    }
    None
}

/// Attempt to book the slot through the portal. Never errors: every problem
/// along the way is a `Failed` outcome, logged with its cause.
pub async fn attempt(portal: &dyn Portal, slot: &Slot, settle: Duration) -> BookingOutcome {
    let key = slot.key();
    let snapshot = match portal.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("⚠️ Booking attempt for {key} could not snapshot page: {e}");
            return BookingOutcome::Failed;
        }
    };

    let Some(index) = find_slot_row(&snapshot, slot) else {
        tracing::warn!("⚠️ No row matching {key} on the current page");
        return BookingOutcome::Failed;
    };

    if let Err(e) = portal.open_row(index).await {
        tracing::warn!("⚠️ Could not open row for {key}: {e}");
        return BookingOutcome::Failed;
    }

    // Give the detail overlay time to appear before looking for the
    // confirmation control.
    tokio::time::sleep(settle).await;

    match portal.confirm_booking().await {
        Ok(true) => {
            tracing::info!("✅ Booked {key}");
            BookingOutcome::Success
        }
        Ok(false) => {
            tracing::warn!("⚠️ Confirmation control missing or disabled for {key}");
            BookingOutcome::Failed
        }
        Err(e) => {
            tracing::warn!("⚠️ Confirming {key} failed: {e}");
            BookingOutcome::Failed
        }
    }
}
