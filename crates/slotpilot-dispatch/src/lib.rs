//! # SlotPilot Dispatch
//!
//! The typed request surface and the dispatcher behind it — the single
//! writer through which every mutation of the schedule and waiting list
//! flows.

pub mod dispatcher;
pub mod messages;

pub use dispatcher::Dispatcher;
pub use messages::{parse_request, Reply, Request};
