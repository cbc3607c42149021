//! Deadline scheduling for queued slots.
//!
//! Two cooperating loops drive bookings: a coarse tick that inspects the
//! head of each week's waiting list roughly once a minute, and a fine
//! countdown that shrinks its sleep interval as a single slot's booking
//! window approaches.

pub mod context;
pub mod countdown;
pub mod engine;

pub use context::SchedulerContext;
pub use countdown::{countdown_interval, run_countdown, CountdownOutcome};
pub use engine::{evaluate, spawn_scheduler, tick, HeadDecision, TickReport};
