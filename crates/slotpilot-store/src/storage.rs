//! SQLite-backed key-value storage area.
//!
//! Every execution context (scheduler loop, page session, CLI) reads and
//! writes the same small set of JSON-encoded keys. Multi-key writes go
//! through one transaction so later reads in the same process never observe
//! a partial update. Change notifications are fanned out on a broadcast
//! channel carrying the list of touched keys.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use slotpilot_core::error::{Result, SlotPilotError};

/// Keys used by the SlotPilot contexts.
pub mod keys {
    /// Latest schedule snapshot (array of slots).
    pub const SCHEDULE: &str = "schedule";
    /// Whether the last scan ran to completion.
    pub const SCANNING_COMPLETE: &str = "scanningComplete";
    /// Unix millis of the last schedule update.
    pub const LAST_UPDATED: &str = "lastUpdated";
    /// Map of week token to ordered slot queue.
    pub const WAITING_LIST: &str = "waitingList";
    /// Which week the tracked page currently displays.
    pub const CURRENT_WEEK_STATE: &str = "currentWeekState";
    /// Last UI selection (week/sort), restored on the next session.
    pub const POPUP_STATE: &str = "popupState";
}

/// The shared durable store.
pub struct StorageArea {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<Vec<String>>,
}

impl StorageArea {
    /// Open or create the store database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| SlotPilotError::Storage(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SlotPilotError::Storage(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(|e| SlotPilotError::Storage(format!("Migration: {e}")))?;
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SlotPilotError::Storage("storage mutex poisoned".into()))
    }

    /// Read one key, decoded from JSON. `Ok(None)` when the key is unset.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(SlotPilotError::Storage(format!("Get {key}: {other}"))),
            })?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Write one key as JSON.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_many(&[(key, serde_json::to_value(value)?)])
    }

    /// Write several keys in one transaction and notify watchers once.
    pub fn set_many(&self, entries: &[(&str, serde_json::Value)]) -> Result<()> {
        {
            let mut conn = self.lock()?;
            let tx = conn
                .transaction()
                .map_err(|e| SlotPilotError::Storage(format!("Begin: {e}")))?;
            let now = Utc::now().to_rfc3339();
            for (key, value) in entries {
                tx.execute(
                    "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![key, value.to_string(), now],
                )
                .map_err(|e| SlotPilotError::Storage(format!("Set {key}: {e}")))?;
            }
            tx.commit()
                .map_err(|e| SlotPilotError::Storage(format!("Commit: {e}")))?;
        }
        let touched: Vec<String> = entries.iter().map(|(k, _)| k.to_string()).collect();
        tracing::debug!("💾 Stored keys: {}", touched.join(", "));
        let _ = self.changes.send(touched);
        Ok(())
    }

    /// Remove a key entirely.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.lock()?
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .map_err(|e| SlotPilotError::Storage(format!("Delete {key}: {e}")))?;
        let _ = self.changes.send(vec![key.to_string()]);
        Ok(())
    }

    /// Subscribe to change notifications (lists of touched keys).
    pub fn watch(&self) -> broadcast::Receiver<Vec<String>> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_unset_key_is_none() {
        let store = StorageArea::open_in_memory().unwrap();
        let value: Option<String> = store.get("missing").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let store = StorageArea::open_in_memory().unwrap();
        store.set(keys::SCANNING_COMPLETE, &true).unwrap();
        assert_eq!(store.get::<bool>(keys::SCANNING_COMPLETE).unwrap(), Some(true));
    }

    #[test]
    fn test_set_many_is_atomically_visible() {
        let store = StorageArea::open_in_memory().unwrap();
        store
            .set_many(&[
                (keys::SCANNING_COMPLETE, serde_json::json!(true)),
                (keys::LAST_UPDATED, serde_json::json!(1_717_000_000_000u64)),
            ])
            .unwrap();
        assert_eq!(store.get::<bool>(keys::SCANNING_COMPLETE).unwrap(), Some(true));
        assert_eq!(
            store.get::<u64>(keys::LAST_UPDATED).unwrap(),
            Some(1_717_000_000_000)
        );
    }

    #[tokio::test]
    async fn test_watch_reports_touched_keys() {
        let store = StorageArea::open_in_memory().unwrap();
        let mut rx = store.watch();
        store.set(keys::CURRENT_WEEK_STATE, &"next").unwrap();
        let touched = rx.recv().await.unwrap();
        assert_eq!(touched, vec![keys::CURRENT_WEEK_STATE.to_string()]);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = std::env::temp_dir().join("slotpilot-storage-test");
        std::fs::remove_dir_all(&dir).ok();
        let store = StorageArea::open(&dir.join("store.db")).unwrap();
        store.set("k", &42u32).unwrap();
        drop(store);
        let store = StorageArea::open(&dir.join("store.db")).unwrap();
        assert_eq!(store.get::<u32>("k").unwrap(), Some(42));
        std::fs::remove_dir_all(&dir).ok();
    }
}
