//! Queue notifications: records what happened to the waiting list and
//! optionally forwards it to a webhook. Lightweight, just a ring buffer
//! and a fire-and-forget POST.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// A notification surfaced to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub priority: NotifyPriority,
    /// Which component produced this.
    pub source: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Notification priority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NotifyPriority {
    Low,
    Normal,
    High,
}

/// In-memory notification history (ring buffer, max 100).
pub struct NotifyRouter {
    history: Vec<Notification>,
}

impl NotifyRouter {
    pub fn new() -> Self {
        Self { history: Vec::new() }
    }

    /// Record a notification in history.
    pub fn record(&mut self, notification: Notification) {
        self.history.push(notification);
        if self.history.len() > 100 {
            self.history.remove(0);
        }
    }

    pub fn history(&self) -> &[Notification] {
        &self.history
    }

    /// Create a notification.
    pub fn create(title: &str, body: &str, source: &str, priority: NotifyPriority) -> Notification {
        Notification {
            title: title.to_string(),
            body: body.to_string(),
            priority,
            source: source.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Default for NotifyRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Records notifications and forwards them to the configured webhook, if any.
pub struct Notifier {
    router: Mutex<NotifyRouter>,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            router: Mutex::new(NotifyRouter::new()),
            webhook_url: webhook_url.filter(|u| !u.is_empty()),
        }
    }

    /// Record and forward a notification. Never fails the caller: delivery
    /// problems are logged and dropped.
    pub fn notify(&self, title: &str, body: &str, source: &str, priority: NotifyPriority) {
        let notification = NotifyRouter::create(title, body, source, priority);
        tracing::info!("📢 [{}] {}: {}", source, title, body);
        if let Ok(mut router) = self.router.lock() {
            router.record(notification.clone());
        }
        if let Some(url) = &self.webhook_url {
            let url = url.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = send_webhook(&url, &notification).await {
                            tracing::warn!("⚠️ Webhook notification failed: {e}");
                        }
                    });
                }
                Err(_) => {
                    tracing::warn!("⚠️ No async runtime, webhook notification not sent");
                }
            }
        }
    }

    /// Recorded notifications, most recent last.
    pub fn history(&self) -> Vec<Notification> {
        self.router
            .lock()
            .map(|r| r.history().to_vec())
            .unwrap_or_default()
    }
}

/// POST a notification to a generic HTTP webhook.
async fn send_webhook(url: &str, notification: &Notification) -> Result<(), String> {
    let client = reqwest::Client::new();
    let resp = client
        .post(url)
        .json(&serde_json::json!({
            "title": notification.title,
            "body": notification.body,
            "priority": format!("{:?}", notification.priority),
            "source": notification.source,
            "timestamp": notification.timestamp.to_rfc3339(),
        }))
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| format!("Webhook send failed: {e}"))?;

    if resp.status().is_success() {
        Ok(())
    } else {
        Err(format!("Webhook error {}", resp.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_ring_buffer() {
        let mut router = NotifyRouter::new();
        for i in 0..105 {
            router.record(NotifyRouter::create(
                &format!("n{i}"),
                "",
                "test",
                NotifyPriority::Normal,
            ));
        }
        assert_eq!(router.history().len(), 100);
        assert_eq!(router.history()[0].title, "n5");
    }

    #[test]
    fn test_webhook_outside_runtime_still_records() {
        // Plain #[test], so there is no tokio runtime: the webhook delivery
        // is skipped (and logged) but the history entry must survive.
        let notifier = Notifier::new(Some("http://localhost:1/hook".into()));
        notifier.notify("Booking failed", "Yoga", "scheduler", NotifyPriority::High);
        let history = notifier.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].priority, NotifyPriority::High);
    }

    #[test]
    fn test_notifier_records_without_webhook() {
        let notifier = Notifier::new(None);
        notifier.notify("Added to waiting list", "Yoga (Monday)", "store", NotifyPriority::Normal);
        let history = notifier.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].title, "Added to waiting list");
    }
}
