//! Wire messages — the closed set of requests the dispatcher accepts.
//!
//! Requests are JSON objects with an `action` tag. An unknown tag fails at
//! parse time, before any state is touched.

use serde::{Deserialize, Serialize};

use slotpilot_core::slot::{Slot, Week};

/// A request to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Replace the persisted schedule with a fresh scan result.
    UpdateSchedule { schedule: Vec<Slot> },
    /// Queue a slot on its week's waiting list.
    AddToWaitingList { slot: Slot },
    /// Record a new status on an already-queued slot.
    UpdateWaitingListStatus { slot: Slot },
    /// Remove a slot from whichever list holds it.
    RemoveFromWaitingList { slot: Slot },
    /// Start a fine-grained countdown toward this slot's booking window.
    ScheduleBooking { slot: Slot },
    /// Navigate the portal to a week, rescan it and persist the result.
    NavigateWeek { week: Week },
    /// Rescan the currently displayed week and persist the result.
    ScanSchedule { week: Week },
}

/// The dispatcher's answer to any request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    pub fn ok_with(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            data: None,
        }
    }
}

/// Parse a raw JSON request. Malformed input or an unrecognized `action`
/// is an error, never a silent no-op.
pub fn parse_request(raw: &str) -> Result<Request, String> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid request: {e}"))
}
