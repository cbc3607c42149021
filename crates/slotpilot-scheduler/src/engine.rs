//! The coarse scheduling pass.
//!
//! Once per tick the engine looks at the head of each week's waiting list
//! and decides what to do with it. Only the head is considered: entries are
//! booked in queue order, and a head that is not yet due shields everything
//! behind it until the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};

use slotpilot_core::error::Result;
use slotpilot_core::slot::{Slot, SlotStatus, Week};
use slotpilot_page::{attempt, BookingOutcome};
use slotpilot_store::NotifyPriority;

use crate::context::SchedulerContext;

/// What to do with the head of a waiting list at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadDecision {
    /// The booking window is open. Book now.
    Due,
    /// Not yet due. The payload is the time left until the window opens.
    Pending(Duration),
    /// The entry needs no attempt: already reserved, or unusable
    /// (unparseable date or time). Pop it so it stops blocking the queue.
    Drain,
}

/// Outcome of one scheduling pass, mostly for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: usize,
    pub drained: usize,
    /// Shortest wait among heads that are still pending.
    pub next_due_in: Option<Duration>,
}

/// Pure deadline check for a single slot.
pub fn evaluate(slot: &Slot, now: NaiveDateTime) -> HeadDecision {
    if slot.status == SlotStatus::Success {
        return HeadDecision::Drain;
    }
    let Some(target) = slot.target_instant() else {
        return HeadDecision::Drain;
    };
    let remaining = target - now;
    match remaining.to_std() {
        Ok(wait) if !wait.is_zero() => HeadDecision::Pending(wait),
        _ => HeadDecision::Due,
    }
}

/// Run one scheduling pass over both weeks.
///
/// Only the head of each week is touched, and each week sees at most one
/// action (drain or dispatch) per pass. A dispatched slot leaves the queue
/// whether the booking succeeded or not. A due slot with no reachable
/// portal stays queued for a later pass.
pub async fn tick(ctx: &SchedulerContext, now: NaiveDateTime) -> Result<TickReport> {
    let mut report = TickReport::default();

    for week in Week::ALL {
        let Some(slot) = ctx.waiting.head_of(week)? else {
            continue;
        };
        match evaluate(&slot, now) {
            HeadDecision::Drain => {
                tracing::info!(
                    "🗑️ Draining head of {week} without an attempt: {}",
                    slot.key()
                );
                ctx.waiting.pop_head(week)?;
                report.drained += 1;
            }
            HeadDecision::Pending(wait) => {
                tracing::debug!(
                    "📅 Head of {week} ({}) due in {}s",
                    slot.key(),
                    wait.as_secs()
                );
                report.next_due_in = Some(match report.next_due_in {
                    Some(best) => best.min(wait),
                    None => wait,
                });
            }
            HeadDecision::Due => {
                if dispatch_head(ctx, week, &slot).await? {
                    report.dispatched += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Book the due head of `week`. Returns whether an attempt was made.
async fn dispatch_head(ctx: &SchedulerContext, week: Week, slot: &Slot) -> Result<bool> {
    let key = slot.key();
    let Some(portal) = ctx.portal.clone() else {
        tracing::warn!("⚠️ {key} is due but no portal is configured, leaving it queued");
        return Ok(false);
    };
    if !portal.is_reachable().await {
        tracing::warn!("⚠️ {key} is due but the portal is unreachable, leaving it queued");
        return Ok(false);
    }

    tracing::info!("🔔 Booking window open for {key}, attempting");
    let outcome = attempt(portal.as_ref(), slot, ctx.settle).await;
    // Evict by identity, not by position: a countdown task may have removed
    // this entry during the settle window, and a blind head pop would then
    // take the next entry with it.
    ctx.waiting.remove(&key)?;

    match outcome {
        BookingOutcome::Success => {
            ctx.notifier.notify(
                "Booking confirmed",
                &format!("{} {} {} is booked", slot.name, slot.date, slot.start),
                "scheduler",
                NotifyPriority::Normal,
            );
        }
        BookingOutcome::Failed => {
            ctx.notifier.notify(
                "Booking failed",
                &format!("Could not book {} {} {}", slot.name, slot.date, slot.start),
                "scheduler",
                NotifyPriority::High,
            );
        }
    }
    Ok(true)
}

/// Spawn the periodic scheduling loop onto the runtime.
pub fn spawn_scheduler(ctx: Arc<SchedulerContext>, tick_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let now = Local::now().naive_local();
            match tick(&ctx, now).await {
                Ok(report) if report.dispatched > 0 || report.drained > 0 => {
                    tracing::info!(
                        "✅ Scheduler pass: {} dispatched, {} drained",
                        report.dispatched,
                        report.drained
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("⚠️ Scheduler pass failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use slotpilot_core::slot::SlotStatus;
    use slotpilot_page::{NavAction, PageRow, PageSnapshot, Portal};
    use slotpilot_store::{Notifier, StorageArea, WaitingStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakePortal {
        snapshot: PageSnapshot,
        confirm: bool,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Portal for FakePortal {
        async fn is_reachable(&self) -> bool {
            true
        }
        async fn snapshot(&self) -> Result<PageSnapshot> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshot.clone())
        }
        async fn open_row(&self, _index: usize) -> Result<()> {
            Ok(())
        }
        async fn confirm_booking(&self) -> Result<bool> {
            Ok(self.confirm)
        }
        async fn navigate(&self, _action: NavAction) -> Result<()> {
            Ok(())
        }
    }

    fn slot(name: &str, date: &str, start: &str) -> Slot {
        Slot {
            day: "Monday".into(),
            date: date.into(),
            start: start.into(),
            finish: "19:00".into(),
            name: name.into(),
            color: "rgb(0, 123, 255)".into(),
            is_available: true,
            status: SlotStatus::Waiting,
            week: Some(Week::This),
        }
    }

    fn context(portal: Option<Arc<dyn Portal>>) -> SchedulerContext {
        let storage = Arc::new(StorageArea::open_in_memory().unwrap());
        let notifier = Arc::new(Notifier::new(None));
        let waiting = Arc::new(WaitingStore::new(storage, notifier.clone()));
        SchedulerContext::new(waiting, notifier, portal, Duration::from_millis(1))
    }

    fn page_for(s: &Slot) -> PageSnapshot {
        PageSnapshot::new(vec![
            PageRow::Heading {
                date: s.date.clone(),
                label: s.day.clone(),
            },
            PageRow::Item {
                time_text: format!("{} - {}", s.start, s.finish),
                title: s.name.clone(),
                color: s.color.clone(),
                bookable: true,
                event_id: Some("ev-1".into()),
            },
        ])
    }

    #[test]
    fn test_evaluate_decisions() {
        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();

        // Blue slot exactly seven days out: window opens right now.
        let due = slot("Yoga", "2024-06-10", "18:00");
        assert_eq!(evaluate(&due, now), HeadDecision::Due);

        // One second later than the boundary: still pending.
        let pending = slot("Yoga", "2024-06-10", "18:01");
        assert_eq!(
            evaluate(&pending, now),
            HeadDecision::Pending(Duration::from_secs(60))
        );

        let garbage = slot("Yoga", "not-a-date", "18:00");
        assert_eq!(evaluate(&garbage, now), HeadDecision::Drain);
    }

    #[test]
    fn test_evaluate_red_slot_uses_longer_offset() {
        let now = NaiveDateTime::parse_from_str("2024-06-03T06:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        // Red offset is 7.5 days, so an event 7.5 days out is due now.
        let mut red = slot("Gym", "2024-06-10", "18:00");
        red.color = "rgb(220, 53, 69)".into();
        assert_eq!(evaluate(&red, now), HeadDecision::Due);
    }

    #[tokio::test]
    async fn test_tick_dispatches_due_head_and_pops_it() {
        let due = slot("Yoga", "2024-06-10", "18:00");
        let portal = Arc::new(FakePortal {
            snapshot: page_for(&due),
            confirm: true,
            attempts: AtomicUsize::new(0),
        });
        let ctx = context(Some(portal.clone()));
        ctx.waiting.add(due.clone()).unwrap();

        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let report = tick(&ctx, now).await.unwrap();

        assert_eq!(report.dispatched, 1);
        assert_eq!(portal.attempts.load(Ordering::SeqCst), 1);
        assert!(!ctx.waiting.contains(&due.key()).unwrap());
    }

    #[tokio::test]
    async fn test_tick_pops_head_even_when_booking_fails() {
        let due = slot("Yoga", "2024-06-10", "18:00");
        let portal = Arc::new(FakePortal {
            snapshot: PageSnapshot::default(),
            confirm: false,
            attempts: AtomicUsize::new(0),
        });
        let ctx = context(Some(portal));
        ctx.waiting.add(due.clone()).unwrap();

        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let report = tick(&ctx, now).await.unwrap();

        assert_eq!(report.dispatched, 1);
        assert!(!ctx.waiting.contains(&due.key()).unwrap());
        let history = ctx.notifier.history();
        assert!(history.iter().any(|n| n.title == "Booking failed"));
    }

    /// Portal whose page load coincides with the slot being removed from
    /// the waiting list, like a countdown task finishing first.
    struct EvictingPortal {
        waiting: Arc<WaitingStore>,
        evict: slotpilot_core::slot::SlotKey,
    }

    #[async_trait]
    impl Portal for EvictingPortal {
        async fn is_reachable(&self) -> bool {
            true
        }
        async fn snapshot(&self) -> Result<PageSnapshot> {
            self.waiting.remove(&self.evict).unwrap();
            Ok(PageSnapshot::default())
        }
        async fn open_row(&self, _index: usize) -> Result<()> {
            Ok(())
        }
        async fn confirm_booking(&self) -> Result<bool> {
            Ok(false)
        }
        async fn navigate(&self, _action: NavAction) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_spares_other_entries_when_slot_vanishes_mid_attempt() {
        let storage = Arc::new(StorageArea::open_in_memory().unwrap());
        let notifier = Arc::new(Notifier::new(None));
        let waiting = Arc::new(WaitingStore::new(storage, notifier.clone()));

        let pending = slot("Tennis", "2024-06-20", "10:00");
        let due = slot("Yoga", "2024-06-10", "18:00");
        waiting.add(pending.clone()).unwrap();
        waiting.add(due.clone()).unwrap();

        let portal = Arc::new(EvictingPortal {
            waiting: waiting.clone(),
            evict: due.key(),
        });
        let ctx = SchedulerContext::new(waiting, notifier, Some(portal), Duration::from_millis(1));

        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let report = tick(&ctx, now).await.unwrap();

        assert_eq!(report.dispatched, 1);
        assert!(!ctx.waiting.contains(&due.key()).unwrap());
        // The entry behind the vanished head is untouched.
        assert!(ctx.waiting.contains(&pending.key()).unwrap());
    }

    #[tokio::test]
    async fn test_tick_leaves_due_slot_queued_without_portal() {
        let due = slot("Yoga", "2024-06-10", "18:00");
        let ctx = context(None);
        ctx.waiting.add(due.clone()).unwrap();

        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let report = tick(&ctx, now).await.unwrap();

        assert_eq!(report.dispatched, 0);
        assert!(ctx.waiting.contains(&due.key()).unwrap());
    }

    #[tokio::test]
    async fn test_tick_drains_reserved_head_without_attempt() {
        let ctx = context(None);
        let mut reserved = slot("Yoga", "2024-06-05", "18:00");
        reserved.status = SlotStatus::Success;
        ctx.waiting.add(reserved.clone()).unwrap();

        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let report = tick(&ctx, now).await.unwrap();

        assert_eq!(report.drained, 1);
        assert_eq!(report.dispatched, 0);
        assert!(!ctx.waiting.contains(&reserved.key()).unwrap());
    }

    #[tokio::test]
    async fn test_tick_drains_at_most_one_head_per_week() {
        let ctx = context(None);
        // LIFO insertion puts the garbage entry in front of the pending one.
        let pending = slot("Yoga", "2024-06-20", "18:00");
        ctx.waiting.add(pending.clone()).unwrap();
        ctx.waiting.add(slot("Broken", "junk", "18:00")).unwrap();

        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let report = tick(&ctx, now).await.unwrap();

        // The garbage head is popped; the entry behind it waits for the
        // next pass.
        assert_eq!(report.drained, 1);
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.next_due_in, None);
        assert!(ctx.waiting.contains(&pending.key()).unwrap());

        let report = tick(&ctx, now).await.unwrap();
        assert_eq!(report.drained, 0);
        assert!(report.next_due_in.is_some());
    }

    #[tokio::test]
    async fn test_tick_does_not_dispatch_pending_head() {
        let ctx = context(None);
        ctx.waiting.add(slot("Yoga", "2024-06-20", "18:00")).unwrap();

        let now = NaiveDateTime::parse_from_str("2024-06-03T18:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let report = tick(&ctx, now).await.unwrap();

        assert_eq!(report.dispatched, 0);
        let expected = ChronoDuration::days(10).to_std().unwrap();
        assert_eq!(report.next_due_in, Some(expected));
    }
}
