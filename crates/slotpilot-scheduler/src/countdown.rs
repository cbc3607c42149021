//! Fine-grained countdown to a single slot's booking window.
//!
//! The coarse tick wakes once a minute; that is too blunt to land the
//! attempt right when the window opens. The countdown sleeps in shrinking
//! intervals, rechecking the clock each time, and fires the booking the
//! moment the deadline passes.

use std::time::Duration;

use chrono::Local;

use slotpilot_core::error::Result;
use slotpilot_core::slot::{Slot, SlotStatus};
use slotpilot_page::{attempt, BookingOutcome};
use slotpilot_store::NotifyPriority;

use crate::context::SchedulerContext;

/// How one countdown run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Success,
    Failed,
    /// The slot left the waiting list while we were counting down.
    Cancelled,
}

/// Sleep interval for a given remaining wait. Coarse far out, sharpening
/// to half a second inside the final five seconds.
pub fn countdown_interval(remaining: Duration) -> Duration {
    let secs = remaining.as_secs_f64();
    if secs > 126.0 {
        Duration::from_secs(60)
    } else if secs > 40.0 {
        Duration::from_secs(15)
    } else if secs > 15.0 {
        Duration::from_secs(5)
    } else if secs > 5.0 {
        Duration::from_secs(1)
    } else {
        Duration::from_millis(500)
    }
}

/// Count down to the slot's booking window and fire the attempt.
///
/// While waiting, each wake rechecks that the slot is still queued; a slot
/// removed through the dispatcher cancels the run. Once the window is open
/// the attempt fires immediately, without a final queue check, since the
/// coarse scheduler may already have popped the entry on its own pass.
pub async fn run_countdown(ctx: &SchedulerContext, slot: Slot) -> Result<CountdownOutcome> {
    let key = slot.key();
    let Some(target) = slot.target_instant() else {
        tracing::warn!("🗑️ Cannot count down to {key}, removing unparseable entry");
        ctx.waiting.remove(&key)?;
        return Ok(CountdownOutcome::Cancelled);
    };

    loop {
        let now = Local::now().naive_local();
        let remaining = match (target - now).to_std() {
            Ok(wait) if !wait.is_zero() => wait,
            _ => break,
        };
        if !ctx.waiting.contains(&key)? {
            tracing::info!("📅 {key} left the waiting list, countdown cancelled");
            return Ok(CountdownOutcome::Cancelled);
        }
        let interval = countdown_interval(remaining);
        tracing::debug!(
            "⏳ {key} opens in {:.1}s, sleeping {:.1}s",
            remaining.as_secs_f64(),
            interval.as_secs_f64()
        );
        tokio::time::sleep(interval.min(remaining)).await;
    }

    let Some(portal) = ctx.portal.clone() else {
        tracing::warn!("⚠️ Countdown for {key} reached the window with no portal configured");
        return Ok(CountdownOutcome::Failed);
    };

    tracing::info!("🔔 Window open for {key}, firing booking attempt");
    match attempt(portal.as_ref(), &slot, ctx.settle).await {
        BookingOutcome::Success => {
            ctx.waiting.remove(&key)?;
            ctx.notifier.notify(
                "Booking confirmed",
                &format!("{} {} {} is booked", slot.name, slot.date, slot.start),
                "countdown",
                NotifyPriority::Normal,
            );
            Ok(CountdownOutcome::Success)
        }
        BookingOutcome::Failed => {
            ctx.waiting.update_status(&key, SlotStatus::Failed)?;
            ctx.notifier.notify(
                "Booking failed",
                &format!("Could not book {} {} {}", slot.name, slot.date, slot.start),
                "countdown",
                NotifyPriority::High,
            );
            Ok(CountdownOutcome::Failed)
        }
    }
}
