use std::sync::Arc;
use std::time::Duration;

use slotpilot_page::Portal;
use slotpilot_store::{Notifier, WaitingStore};

/// Everything a scheduling pass needs, passed explicitly instead of living
/// in globals. The portal is optional: without one the scheduler still
/// drains stale entries but leaves due slots queued.
pub struct SchedulerContext {
    pub waiting: Arc<WaitingStore>,
    pub notifier: Arc<Notifier>,
    pub portal: Option<Arc<dyn Portal>>,
    /// Delay between opening a slot row and pressing confirm.
    pub settle: Duration,
}

impl SchedulerContext {
    pub fn new(
        waiting: Arc<WaitingStore>,
        notifier: Arc<Notifier>,
        portal: Option<Arc<dyn Portal>>,
        settle: Duration,
    ) -> Self {
        Self {
            waiting,
            notifier,
            portal,
            settle,
        }
    }
}
