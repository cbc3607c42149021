//! The dispatcher — the single writer for schedule and waiting-list state.
//!
//! Every mutation, whether it comes from the CLI or from an automation
//! client, arrives here as a [`Request`] and leaves as a [`Reply`]. Keeping
//! one writer makes the read-modify-write cycles in the store race-free in
//! practice and gives one place to log every state change.

use std::sync::Arc;

use chrono::Local;

use slotpilot_core::error::Result;
use slotpilot_core::slot::{Slot, SlotStatus, Week};
use slotpilot_page::{navigation_step, scan};
use slotpilot_scheduler::{run_countdown, SchedulerContext};
use slotpilot_store::{keys, StorageArea};

use crate::messages::{parse_request, Reply, Request};

pub struct Dispatcher {
    storage: Arc<StorageArea>,
    ctx: Arc<SchedulerContext>,
}

impl Dispatcher {
    pub fn new(storage: Arc<StorageArea>, ctx: Arc<SchedulerContext>) -> Self {
        Self { storage, ctx }
    }

    /// Handle a raw JSON request. A parse failure touches no state.
    pub async fn handle_raw(&self, raw: &str) -> Reply {
        match parse_request(raw) {
            Ok(request) => self.handle(request).await,
            Err(e) => Reply::err(e),
        }
    }

    /// Handle a typed request. Every variant is matched explicitly so a new
    /// request kind cannot slip through unhandled.
    pub async fn handle(&self, request: Request) -> Reply {
        let result = match request {
            Request::UpdateSchedule { schedule } => self.update_schedule(schedule),
            Request::AddToWaitingList { slot } => self.add_to_waiting_list(slot),
            Request::UpdateWaitingListStatus { slot } => self.update_status(slot),
            Request::RemoveFromWaitingList { slot } => self.remove_from_waiting_list(slot),
            Request::ScheduleBooking { slot } => self.schedule_booking(slot),
            Request::NavigateWeek { week } => self.navigate_week(week).await,
            Request::ScanSchedule { week } => self.scan_schedule(week).await,
        };
        match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("⚠️ Request failed: {e}");
                Reply::err(e.to_string())
            }
        }
    }

    /// Persist a fresh scan result and stamp the scan metadata, all in one
    /// storage transaction.
    fn update_schedule(&self, schedule: Vec<Slot>) -> Result<Reply> {
        self.persist_schedule(&schedule)?;
        tracing::info!("💾 Schedule updated with {} slots", schedule.len());
        Ok(Reply::ok())
    }

    fn add_to_waiting_list(&self, slot: Slot) -> Result<Reply> {
        self.ctx.waiting.add(slot)?;
        Ok(Reply::ok())
    }

    fn update_status(&self, slot: Slot) -> Result<Reply> {
        self.ctx.waiting.update_status(&slot.key(), slot.status)?;
        Ok(Reply::ok())
    }

    fn remove_from_waiting_list(&self, slot: Slot) -> Result<Reply> {
        self.ctx.waiting.remove(&slot.key())?;
        tracing::info!("🗑️ Removed {} from the waiting list", slot.key());
        Ok(Reply::ok())
    }

    /// Queue the slot (if it is not already queued) and start a countdown
    /// task toward its booking window.
    fn schedule_booking(&self, slot: Slot) -> Result<Reply> {
        if self.ctx.portal.is_none() {
            return Err(slotpilot_core::error::SlotPilotError::NoPortal);
        }
        if !self.ctx.waiting.contains(&slot.key())? {
            self.ctx.waiting.add(slot.clone())?;
        }
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let key = slot.key();
            match run_countdown(&ctx, slot).await {
                Ok(outcome) => tracing::info!("⏰ Countdown for {key} ended: {outcome:?}"),
                Err(e) => tracing::error!("⚠️ Countdown for {key} failed: {e}"),
            }
        });
        Ok(Reply::ok())
    }

    /// Move the portal to `week`, rescan it and persist the result.
    async fn navigate_week(&self, week: Week) -> Result<Reply> {
        let portal = self
            .ctx
            .portal
            .clone()
            .ok_or(slotpilot_core::error::SlotPilotError::NoPortal)?;
        let current = self.ctx.waiting.current_week()?;
        if let Some(action) = navigation_step(current, week) {
            tracing::info!("🧭 Navigating from {current} to {week}");
            portal.navigate(action).await?;
        }
        self.ctx.waiting.set_current_week(week)?;
        self.rescan(week).await
    }

    /// Rescan whatever week the portal currently shows and persist it
    /// under `week`.
    async fn scan_schedule(&self, week: Week) -> Result<Reply> {
        self.rescan(week).await
    }

    async fn rescan(&self, week: Week) -> Result<Reply> {
        let portal = self
            .ctx
            .portal
            .clone()
            .ok_or(slotpilot_core::error::SlotPilotError::NoPortal)?;
        let snapshot = portal.snapshot().await?;
        let now = Local::now().naive_local();
        let mut schedule = scan(&snapshot, now);
        for slot in &mut schedule {
            slot.week = Some(week);
        }
        self.persist_schedule(&schedule)?;

        // Slots the page already shows as reserved belong on the list as
        // confirmed bookings.
        for slot in schedule.iter().filter(|s| s.status == SlotStatus::Success) {
            if !self.ctx.waiting.contains(&slot.key())? {
                self.ctx.waiting.add(slot.clone())?;
            }
        }

        tracing::info!("🔍 Scanned {week}: {} upcoming slots", schedule.len());
        Ok(Reply::ok_with(serde_json::to_value(&schedule)?))
    }

    fn persist_schedule(&self, schedule: &[Slot]) -> Result<()> {
        self.storage.set_many(&[
            (keys::SCHEDULE, serde_json::to_value(schedule)?),
            (
                keys::LAST_UPDATED,
                serde_json::json!(Local::now().timestamp_millis()),
            ),
            (keys::SCANNING_COMPLETE, serde_json::json!(true)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use slotpilot_page::{NavAction, PageRow, PageSnapshot, Portal};
    use slotpilot_store::{Notifier, WaitingStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakePortal {
        snapshot: PageSnapshot,
        navigations: AtomicUsize,
    }

    #[async_trait]
    impl Portal for FakePortal {
        async fn is_reachable(&self) -> bool {
            true
        }
        async fn snapshot(&self) -> Result<PageSnapshot> {
            Ok(self.snapshot.clone())
        }
        async fn open_row(&self, _index: usize) -> Result<()> {
            Ok(())
        }
        async fn confirm_booking(&self) -> Result<bool> {
            Ok(true)
        }
        async fn navigate(&self, _action: NavAction) -> Result<()> {
            self.navigations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn slot(name: &str) -> Slot {
        Slot {
            day: "Monday".into(),
            date: "2024-06-10".into(),
            start: "18:00".into(),
            finish: "19:00".into(),
            name: name.into(),
            color: "rgb(0, 123, 255)".into(),
            is_available: true,
            status: SlotStatus::Waiting,
            week: None,
        }
    }

    fn dispatcher(portal: Option<Arc<dyn Portal>>) -> Dispatcher {
        let storage = Arc::new(StorageArea::open_in_memory().unwrap());
        let notifier = Arc::new(Notifier::new(None));
        let waiting = Arc::new(WaitingStore::new(storage.clone(), notifier.clone()));
        let ctx = Arc::new(SchedulerContext::new(
            waiting,
            notifier,
            portal,
            Duration::from_millis(1),
        ));
        Dispatcher::new(storage, ctx)
    }

    #[tokio::test]
    async fn test_add_and_remove_round_trip() {
        let d = dispatcher(None);
        let s = slot("Yoga");

        let reply = d.handle(Request::AddToWaitingList { slot: s.clone() }).await;
        assert!(reply.success);
        assert!(d.ctx.waiting.contains(&s.key()).unwrap());

        let reply = d
            .handle(Request::RemoveFromWaitingList { slot: s.clone() })
            .await;
        assert!(reply.success);
        assert!(!d.ctx.waiting.contains(&s.key()).unwrap());
    }

    #[tokio::test]
    async fn test_update_schedule_stamps_metadata() {
        let d = dispatcher(None);
        let reply = d
            .handle(Request::UpdateSchedule {
                schedule: vec![slot("Yoga")],
            })
            .await;
        assert!(reply.success);

        let stored: Vec<Slot> = d.storage.get(keys::SCHEDULE).unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        let complete: bool = d.storage.get(keys::SCANNING_COMPLETE).unwrap().unwrap();
        assert!(complete);
        let stamp: i64 = d.storage.get(keys::LAST_UPDATED).unwrap().unwrap();
        assert!(stamp > 0);
    }

    #[tokio::test]
    async fn test_update_status_by_identity() {
        let d = dispatcher(None);
        let mut s = slot("Yoga");
        d.handle(Request::AddToWaitingList { slot: s.clone() }).await;

        s.status = SlotStatus::Failed;
        let reply = d
            .handle(Request::UpdateWaitingListStatus { slot: s.clone() })
            .await;
        assert!(reply.success);

        let lists = d.ctx.waiting.load().unwrap();
        let entry = lists.values().flatten().find(|e| e.matches(&s.key())).unwrap();
        assert_eq!(entry.status, SlotStatus::Failed);
    }

    #[tokio::test]
    async fn test_schedule_booking_requires_portal() {
        let d = dispatcher(None);
        let reply = d
            .handle(Request::ScheduleBooking { slot: slot("Yoga") })
            .await;
        assert!(!reply.success);
        // Nothing was queued either.
        assert!(d.ctx.waiting.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_navigate_week_requires_portal() {
        let d = dispatcher(None);
        let reply = d.handle(Request::NavigateWeek { week: Week::Next }).await;
        assert!(!reply.success);
        assert!(reply.error.is_some());
    }

    #[tokio::test]
    async fn test_navigate_week_scans_and_tracks_week() {
        let portal = Arc::new(FakePortal {
            snapshot: PageSnapshot::new(vec![
                PageRow::Heading {
                    date: "2999-06-10".into(),
                    label: "Monday".into(),
                },
                PageRow::Item {
                    time_text: "18:00 - 19:00".into(),
                    title: "Yoga".into(),
                    color: "rgb(0, 123, 255)".into(),
                    bookable: true,
                    event_id: Some("ev-1".into()),
                },
            ]),
            navigations: AtomicUsize::new(0),
        });
        let d = dispatcher(Some(portal.clone()));

        let reply = d.handle(Request::NavigateWeek { week: Week::Next }).await;
        assert!(reply.success);
        assert_eq!(portal.navigations.load(Ordering::SeqCst), 1);
        assert_eq!(d.ctx.waiting.current_week().unwrap(), Week::Next);

        let stored: Vec<Slot> = d.storage.get(keys::SCHEDULE).unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].week, Some(Week::Next));

        // Navigating to the week already shown skips the gesture.
        let reply = d.handle(Request::NavigateWeek { week: Week::Next }).await;
        assert!(reply.success);
        assert_eq!(portal.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scan_queues_already_reserved_slots() {
        let portal = Arc::new(FakePortal {
            snapshot: PageSnapshot::new(vec![
                PageRow::Heading {
                    date: "2999-06-10".into(),
                    label: "Monday".into(),
                },
                PageRow::Item {
                    time_text: "18:00 - 19:00".into(),
                    title: "Yoga".into(),
                    color: "rgb(40, 167, 69)".into(),
                    bookable: false,
                    event_id: None,
                },
            ]),
            navigations: AtomicUsize::new(0),
        });
        let d = dispatcher(Some(portal));

        let reply = d.handle(Request::ScanSchedule { week: Week::This }).await;
        assert!(reply.success);

        let lists = d.ctx.waiting.load().unwrap();
        let entry = lists.values().flatten().find(|e| e.name == "Yoga").unwrap();
        assert_eq!(entry.status, SlotStatus::Success);
    }

    #[tokio::test]
    async fn test_raw_request_with_unknown_action_mutates_nothing() {
        let d = dispatcher(None);
        let reply = d.handle_raw(r#"{"action": "formatDisk"}"#).await;
        assert!(!reply.success);
        assert!(d.ctx.waiting.load().unwrap().is_empty());
        assert!(d.storage.get::<Vec<Slot>>(keys::SCHEDULE).unwrap().is_none());
    }
}
