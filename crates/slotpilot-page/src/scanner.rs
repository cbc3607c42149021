//! Schedule scanner — turns a page snapshot into normalized slots.
//!
//! Stateless: every call recomputes from scratch. Malformed rows are skipped
//! silently; a snapshot without any heading falls back to today's date.

use chrono::{NaiveDate, NaiveDateTime};

use slotpilot_core::slot::{
    classify, red_scan_lower_bound, red_scan_upper_bound, Slot, SlotCategory,
};

use crate::snapshot::{PageRow, PageSnapshot};

/// Extract the future bookable/reserved slots from a snapshot.
///
/// The date cursor follows heading rows in document order but never regresses
/// to a date before today, so late duplicate headings for past days cannot
/// drag items backwards.
pub fn scan(snapshot: &PageSnapshot, now: NaiveDateTime) -> Vec<Slot> {
    let today = now.date();
    let (mut current_date, mut current_day) = match first_heading(snapshot) {
        Some((date, label)) => (date, label),
        None => {
            let fallback = today.format("%Y-%m-%d").to_string();
            tracing::warn!("📄 No heading row found, falling back to date {fallback}");
            (fallback, today.format("%A, %B %-d").to_string())
        }
    };

    let mut schedule = Vec::new();
    for row in &snapshot.rows {
        match row {
            PageRow::Heading { date, label } => {
                if heading_date_is_current(date, today) {
                    current_date = date.clone();
                    if !label.is_empty() {
                        current_day = label.clone();
                    }
                }
            }
            PageRow::Item {
                time_text,
                title,
                color,
                bookable,
                ..
            } => {
                let parts: Vec<&str> = time_text.split(" - ").collect();
                if parts.len() != 2 {
                    continue;
                }
                let (start, finish) = (parts[0].trim(), parts[1].trim());
                let Some(event_start) = parse_event_start(&current_date, start) else {
                    continue;
                };
                if event_start <= now {
                    continue;
                }

                let (category, status) = classify(color);
                let accepted = match category {
                    SlotCategory::Blue | SlotCategory::Green => known_color(color),
                    SlotCategory::Red => {
                        let until_start = event_start - now;
                        until_start < red_scan_upper_bound()
                            && until_start > red_scan_lower_bound()
                    }
                };
                if !accepted {
                    continue;
                }

                schedule.push(Slot {
                    day: current_day.clone(),
                    date: current_date.clone(),
                    start: start.to_string(),
                    finish: finish.to_string(),
                    name: title.trim().to_string(),
                    color: color.clone(),
                    is_available: *bookable,
                    status,
                    week: None,
                });
            }
        }
    }
    tracing::debug!("🔍 Scan complete, {} slot(s) found", schedule.len());
    schedule
}

fn first_heading(snapshot: &PageSnapshot) -> Option<(String, String)> {
    snapshot.rows.iter().find_map(|row| match row {
        PageRow::Heading { date, label } if !date.is_empty() => {
            Some((date.clone(), label.clone()))
        }
        _ => None,
    })
}

/// A heading only advances the cursor when its date parses and is not in the
/// past.
fn heading_date_is_current(date: &str, today: NaiveDate) -> bool {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed >= today,
        Err(_) => false,
    }
}

fn parse_event_start(date: &str, start: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{date}T{start}:00"), "%Y-%m-%dT%H:%M:%S").ok()
}

/// Whether the color carries one of the recognized category signals; the
/// scan only emits rows it can place, unlike `classify` which defaults.
fn known_color(color: &str) -> bool {
    color.contains("0, 123, 255") || color.contains("40, 167, 69")
}
