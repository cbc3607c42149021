//! Slot definitions — the core data model for bookable time slots.
//!
//! A slot is identified by the `(name, date, start)` triple; there is no
//! surrogate id. The portal signals a slot's category through the row
//! background color, which also decides how long before the event the
//! registration window opens.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which displayed calendar week a slot or queue belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Week {
    This,
    Next,
}

impl Week {
    pub const ALL: [Week; 2] = [Week::This, Week::Next];

    pub fn as_str(&self) -> &'static str {
        match self {
            Week::This => "this",
            Week::Next => "next",
        }
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Week {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "this" => Ok(Week::This),
            "next" => Ok(Week::Next),
            other => Err(format!("unknown week token: {other}")),
        }
    }
}

/// Lifecycle status of a slot in the waiting list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    /// Queued, booking window not yet won.
    Waiting,
    /// Reserved on the portal (either observed or booked by us).
    Success,
    /// A booking attempt ran and did not go through.
    Failed,
}

/// Reservation category derived from the row background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCategory {
    /// Regular open reservation.
    Blue,
    /// Already reserved.
    Green,
    /// Restricted reservation with a late-opening window.
    Red,
}

/// A discrete bookable time window for a named activity on a specific date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    /// Display label of the day ("Monday, June 10").
    pub day: String,
    /// ISO date, yyyy-mm-dd.
    pub date: String,
    /// Start time, HH:MM.
    pub start: String,
    /// End time, HH:MM.
    pub finish: String,
    /// Activity name.
    pub name: String,
    /// Raw background color signal, kept verbatim for re-classification.
    pub color: String,
    /// Whether the row's booking control was enabled at scan time.
    #[serde(rename = "isAvailable")]
    pub is_available: bool,
    pub status: SlotStatus,
    /// Which week's queue this slot belongs to; populated on first add.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<Week>,
}

/// Slot identity: slots are the same entity iff these three fields match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub name: String,
    pub date: String,
    pub start: String,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.date, self.start)
    }
}

impl Slot {
    /// Identity triple of this slot.
    pub fn key(&self) -> SlotKey {
        SlotKey {
            name: self.name.clone(),
            date: self.date.clone(),
            start: self.start.clone(),
        }
    }

    /// Whether this slot has the given identity.
    pub fn matches(&self, key: &SlotKey) -> bool {
        self.name == key.name && self.date == key.date && self.start == key.start
    }

    /// The instant the event itself starts, as a local naive date-time.
    /// `None` when the date/start fields are malformed.
    pub fn event_start(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(
            &format!("{}T{}:00", self.date, self.start),
            "%Y-%m-%dT%H:%M:%S",
        )
        .ok()
    }

    /// Category derived from the stored color signal.
    pub fn category(&self) -> SlotCategory {
        classify(&self.color).0
    }

    /// The instant this slot's registration window opens: event start minus
    /// the category-dependent booking offset.
    pub fn target_instant(&self) -> Option<NaiveDateTime> {
        self.event_start()
            .map(|start| start - booking_offset(self.category()))
    }
}

/// Known RGB fragments on the portal's calendar rows.
const BLUE_SIGNAL: &str = "0, 123, 255";
const GREEN_SIGNAL: &str = "40, 167, 69";
const RED_SIGNALS: [&str; 3] = ["220, 53, 69", "255, 0, 0", "red"];

/// Map a raw background-color signal to a category and initial status.
/// Substring-based; unmatched colors fall back to the blue category.
pub fn classify(color: &str) -> (SlotCategory, SlotStatus) {
    if color.contains(GREEN_SIGNAL) {
        return (SlotCategory::Green, SlotStatus::Success);
    }
    if color.contains(BLUE_SIGNAL) {
        return (SlotCategory::Blue, SlotStatus::Waiting);
    }
    if RED_SIGNALS.iter().any(|sig| color.contains(sig)) {
        return (SlotCategory::Red, SlotStatus::Waiting);
    }
    (SlotCategory::Blue, SlotStatus::Waiting)
}

/// How long before the event start the registration window opens.
pub fn booking_offset(category: SlotCategory) -> Duration {
    match category {
        SlotCategory::Blue | SlotCategory::Green => Duration::days(7),
        SlotCategory::Red => Duration::days(7) + Duration::hours(12),
    }
}

/// Upper bound on how far ahead a red slot is accepted during a scan:
/// 7 days 12 hours (the red window itself).
pub fn red_scan_upper_bound() -> Duration {
    Duration::days(7) + Duration::hours(12)
}

/// Lower bound for accepting a red slot during a scan: just under 7 days,
/// so the entry lands in the queue right before its window opens.
pub fn red_scan_lower_bound() -> Duration {
    Duration::days(7) - Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn slot(color: &str) -> Slot {
        Slot {
            day: "Monday".into(),
            date: "2024-06-10".into(),
            start: "18:00".into(),
            finish: "19:00".into(),
            name: "Yoga".into(),
            color: color.into(),
            is_available: true,
            status: SlotStatus::Waiting,
            week: None,
        }
    }

    #[test]
    fn test_classify_green_is_success() {
        let (cat, status) = classify("rgb(40, 167, 69)");
        assert_eq!(cat, SlotCategory::Green);
        assert_eq!(status, SlotStatus::Success);
    }

    #[test]
    fn test_classify_red_without_other_signals_is_waiting() {
        let (cat, status) = classify("rgb(220, 53, 69)");
        assert_eq!(cat, SlotCategory::Red);
        assert_eq!(status, SlotStatus::Waiting);
        let (cat, _) = classify("red");
        assert_eq!(cat, SlotCategory::Red);
    }

    #[test]
    fn test_classify_unmatched_defaults_to_blue() {
        let (cat, status) = classify("rgb(255, 255, 255)");
        assert_eq!(cat, SlotCategory::Blue);
        assert_eq!(status, SlotStatus::Waiting);
    }

    #[test]
    fn test_booking_offsets_per_category() {
        assert_eq!(booking_offset(SlotCategory::Blue), Duration::days(7));
        assert_eq!(booking_offset(SlotCategory::Green), Duration::days(7));
        assert_eq!(
            booking_offset(SlotCategory::Red),
            Duration::days(7) + Duration::hours(12)
        );
    }

    #[test]
    fn test_event_start_parses_date_and_start() {
        let s = slot("rgb(0, 123, 255)");
        let expected = NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        assert_eq!(s.event_start(), Some(expected));
    }

    #[test]
    fn test_event_start_malformed_is_none() {
        let mut s = slot("rgb(0, 123, 255)");
        s.start = "late".into();
        assert_eq!(s.event_start(), None);
    }

    #[test]
    fn test_target_instant_blue_is_seven_days_before() {
        let s = slot("rgb(0, 123, 255)");
        let expected = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        assert_eq!(s.target_instant(), Some(expected));
    }

    #[test]
    fn test_identity_ignores_non_key_fields() {
        let a = slot("rgb(0, 123, 255)");
        let mut b = slot("rgb(220, 53, 69)");
        b.finish = "20:00".into();
        b.is_available = false;
        assert_eq!(a.key(), b.key());
        assert!(a.matches(&b.key()));
    }

    #[test]
    fn test_slot_round_trip_preserves_fields() {
        let mut s = slot("rgb(0, 123, 255)");
        s.week = Some(Week::Next);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"isAvailable\":true"));
        let back: Slot = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn test_week_tokens() {
        assert_eq!("this".parse::<Week>().unwrap(), Week::This);
        assert_eq!(Week::Next.to_string(), "next");
        assert!("someday".parse::<Week>().is_err());
    }
}
