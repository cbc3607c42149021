//! Portal session — the seam between the core logic and the live page.
//!
//! Everything that needs page access (snapshotting, opening a row,
//! confirming the overlay, switching weeks) goes through the [`Portal`]
//! trait, so the scanner, the booking action and the scheduler are testable
//! against a scripted fake. `HttpPortal` is the live implementation.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use slotpilot_core::config::PortalConfig;
use slotpilot_core::error::{Result, SlotPilotError};
use slotpilot_core::slot::Week;

use crate::html::parse_snapshot;
use crate::snapshot::{PageRow, PageSnapshot};

/// Week-navigation gesture the page understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    /// Advance one week forward.
    NextWeek,
    /// Jump back to the current week.
    Today,
}

/// Explicit week-navigation transition: which gesture, if any, moves the
/// page from `current` to `target`.
pub fn navigation_step(current: Week, target: Week) -> Option<NavAction> {
    match (current, target) {
        (Week::This, Week::Next) => Some(NavAction::NextWeek),
        (Week::Next, Week::This) => Some(NavAction::Today),
        _ => None,
    }
}

/// Access to the tracked calendar page.
#[async_trait]
pub trait Portal: Send + Sync {
    /// Whether a page session currently exists. A DUE slot whose portal is
    /// unreachable stays queued for the next tick.
    async fn is_reachable(&self) -> bool;

    /// Capture the current calendar rows.
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Open the detail overlay for the row at this snapshot index.
    async fn open_row(&self, index: usize) -> Result<()>;

    /// Press the overlay's confirmation control when present and enabled.
    /// `Ok(true)` means the reservation was confirmed.
    async fn confirm_booking(&self) -> Result<bool>;

    /// Perform a week-navigation gesture.
    async fn navigate(&self, action: NavAction) -> Result<()>;
}

/// Live portal session over HTTP.
pub struct HttpPortal {
    client: reqwest::Client,
    config: PortalConfig,
    /// Rows of the most recent snapshot; `open_row` indexes into these.
    last_rows: Mutex<Vec<PageRow>>,
    /// Event id of the currently opened row, pending confirmation.
    pending_event: Mutex<Option<String>>,
}

impl HttpPortal {
    pub fn new(config: PortalConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            last_rows: Mutex::new(Vec::new()),
            pending_event: Mutex::new(None),
        })
    }

    fn profile_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.profile_path)
    }

    fn checkin_url(&self, event_id: &str) -> String {
        format!("{}{}/{}", self.config.base_url, self.config.checkin_path, event_id)
    }

    fn lock_rows(&self) -> Result<std::sync::MutexGuard<'_, Vec<PageRow>>> {
        self.last_rows
            .lock()
            .map_err(|_| SlotPilotError::Portal("portal state poisoned".into()))
    }

    fn lock_pending(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.pending_event
            .lock()
            .map_err(|_| SlotPilotError::Portal("portal state poisoned".into()))
    }
}

#[async_trait]
impl Portal for HttpPortal {
    async fn is_reachable(&self) -> bool {
        match self.client.get(self.profile_url()).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("Portal unreachable: {e}");
                false
            }
        }
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        let resp = self.client.get(self.profile_url()).send().await?;
        if !resp.status().is_success() {
            return Err(SlotPilotError::Portal(format!(
                "Profile page returned {}",
                resp.status()
            )));
        }
        let html = resp.text().await?;
        let snapshot = parse_snapshot(&html);
        *self.lock_rows()? = snapshot.rows.clone();
        Ok(snapshot)
    }

    async fn open_row(&self, index: usize) -> Result<()> {
        let event_id = {
            let rows = self.lock_rows()?;
            match rows.get(index) {
                Some(PageRow::Item { event_id, .. }) => event_id.clone(),
                _ => None,
            }
        }
        .ok_or_else(|| {
            SlotPilotError::Portal(format!("Row {index} has no booking control"))
        })?;

        let resp = self
            .client
            .post(self.checkin_url(&event_id))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SlotPilotError::Portal(format!(
                "Opening event {event_id} returned {}",
                resp.status()
            )));
        }
        *self.lock_pending()? = Some(event_id);
        Ok(())
    }

    async fn confirm_booking(&self) -> Result<bool> {
        let Some(event_id) = self.lock_pending()?.take() else {
            return Ok(false);
        };
        let resp = self
            .client
            .post(format!("{}/confirm", self.checkin_url(&event_id)))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    async fn navigate(&self, action: NavAction) -> Result<()> {
        let seek = match action {
            NavAction::NextWeek => "next",
            NavAction::Today => "today",
        };
        let resp = self
            .client
            .get(format!("{}?seek={seek}", self.profile_url()))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SlotPilotError::Portal(format!(
                "Week navigation returned {}",
                resp.status()
            )));
        }
        // Calendar widgets repaint asynchronously after the gesture.
        tokio::time::sleep(Duration::from_millis(self.config.navigate_settle_ms)).await;
        Ok(())
    }
}
