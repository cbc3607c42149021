//! # SlotPilot Page
//!
//! Everything that touches the portal's calendar page: the normalized row
//! snapshot, tolerant HTML extraction, the schedule scanner, the portal
//! session seam and the booking action.
//!
//! The page markup is an external, unstable contract. Every extraction here
//! degrades to a skipped row or an empty snapshot, never a crash.

pub mod booking;
pub mod html;
pub mod scanner;
pub mod session;
pub mod snapshot;

pub use booking::{attempt, find_slot_row, BookingOutcome};
pub use scanner::scan;
pub use session::{navigation_step, HttpPortal, NavAction, Portal};
pub use snapshot::{PageRow, PageSnapshot};
